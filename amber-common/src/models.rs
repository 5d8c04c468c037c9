//! Progress graph document types
//!
//! These are the persisted and wire shapes of a learner's progress graph.
//! Field names serialize in camelCase to match the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mastery at or above which a topic counts as mastered
pub const MASTERED_THRESHOLD: f64 = 0.8;

/// Mastery at or above which a topic counts as being learned
pub const LEARNING_THRESHOLD: f64 = 0.3;

/// Lock state of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    #[default]
    Locked,
    Learning,
    Mastered,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Locked => "locked",
            TopicStatus::Learning => "learning",
            TopicStatus::Mastered => "mastered",
        }
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One learnable topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicNode {
    pub id: String,
    pub name: String,
    pub subject: String,
    /// Always within [0, 1]
    #[serde(default)]
    pub mastery: f64,
    #[serde(default)]
    pub status: TopicStatus,
    /// Topic ids that must all be mastered before this topic unlocks
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied: Option<DateTime<Utc>>,
    /// Cumulative study time, never decreases
    #[serde(default)]
    pub time_spent: f64,
}

impl TopicNode {
    /// A fresh, locked topic with zero mastery
    pub fn new(id: impl Into<String>, subject: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            subject: subject.into(),
            mastery: 0.0,
            status: TopicStatus::Locked,
            prerequisites: Vec::new(),
            last_studied: None,
            time_spent: 0.0,
        }
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<String>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.status == TopicStatus::Locked
    }

    pub fn is_mastered(&self) -> bool {
        self.status == TopicStatus::Mastered
    }
}

/// Directed link from a topic to a dependent topic
///
/// Edges are informational: they tell the engine which topics to re-check when
/// a topic is mastered. `strength` is stored but carries no logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
}

fn default_strength() -> f64 {
    1.0
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, strength: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            strength,
        }
    }
}

/// A learner's topic graph (one per user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressGraph {
    pub user_id: String,
    #[serde(default)]
    pub nodes: Vec<TopicNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    pub updated_at: DateTime<Utc>,
    /// Write counter used for optimistic concurrency
    #[serde(default)]
    pub version: i64,
}

impl ProgressGraph {
    /// An empty graph as created at registration
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    pub fn node(&self, id: &str) -> Option<&TopicNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut TopicNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Ids of topics reachable by one edge from `id`
    pub fn dependents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }

    pub fn edge_mut(&mut self, from: &str, to: &str) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.from == from && e.to == to)
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TopicStatus::Mastered).unwrap(), json!("mastered"));
        let parsed: TopicStatus = serde_json::from_value(json!("learning")).unwrap();
        assert_eq!(parsed, TopicStatus::Learning);
    }

    #[test]
    fn test_node_wire_shape_is_camel_case() {
        let node = TopicNode::new("algebra-1", "Math");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], "algebra-1");
        assert_eq!(value["name"], "algebra-1");
        assert_eq!(value["status"], "locked");
        assert_eq!(value["timeSpent"], 0.0);
        assert!(value.get("lastStudied").is_none());
    }

    #[test]
    fn test_node_missing_fields_take_defaults() {
        let node: TopicNode = serde_json::from_value(json!({
            "id": "x",
            "name": "x",
            "subject": "General"
        }))
        .unwrap();
        assert_eq!(node.mastery, 0.0);
        assert_eq!(node.status, TopicStatus::Locked);
        assert!(node.prerequisites.is_empty());
    }

    #[test]
    fn test_dependents_follow_edge_direction() {
        let mut graph = ProgressGraph::empty("u1");
        graph.edges.push(Edge::new("a", "b", 1.0));
        graph.edges.push(Edge::new("a", "c", 0.5));
        graph.edges.push(Edge::new("b", "c", 1.0));

        let dependents: Vec<&str> = graph.dependents_of("a").collect();
        assert_eq!(dependents, vec!["b", "c"]);
        assert_eq!(graph.dependents_of("c").count(), 0);
    }
}
