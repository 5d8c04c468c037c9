//! Progress graph rules
//!
//! Pure functions over an in-memory [`ProgressGraph`]: exponential mastery
//! smoothing, prerequisite-gated unlocking, recommendation ranking, and concept
//! ingestion. Nothing here touches storage; [`crate::tracker`] wraps these in
//! serialized read-modify-write cycles.

use amber_common::models::{LEARNING_THRESHOLD, MASTERED_THRESHOLD};
use amber_common::{Edge, Error, ProgressGraph, Result, TopicNode, TopicStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight of the existing mastery in one update
pub const HISTORY_WEIGHT: f64 = 0.7;

/// Weight of the new performance sample in one update
pub const SAMPLE_WEIGHT: f64 = 0.3;

/// Topics at or above this mastery are not recommended
pub const RECOMMENDATION_CEILING: f64 = 0.7;

/// Length of the recommendation list
pub const MAX_RECOMMENDATIONS: usize = 3;

/// Subject given to concepts from materials without one
pub const DEFAULT_SUBJECT: &str = "General";

/// Strength of edges derived from material prerequisites
pub const DERIVED_EDGE_STRENGTH: f64 = 1.0;

/// `clamp(0, 1, old * 0.7 + performance * 0.3)`
pub fn smooth_mastery(old_mastery: f64, performance: f64) -> f64 {
    (old_mastery * HISTORY_WEIGHT + performance * SAMPLE_WEIGHT).clamp(0.0, 1.0)
}

/// Status after a mastery change
///
/// A locked topic stays locked while any prerequisite is unmastered. Once out
/// of `locked`, a topic never returns to it: a mastered topic that falls below
/// the learning threshold drops to `learning`.
pub fn derive_status(current: TopicStatus, mastery: f64, prerequisites_met: bool) -> TopicStatus {
    if current == TopicStatus::Locked && !prerequisites_met {
        return TopicStatus::Locked;
    }

    if mastery >= MASTERED_THRESHOLD {
        TopicStatus::Mastered
    } else if mastery >= LEARNING_THRESHOLD {
        TopicStatus::Learning
    } else if current == TopicStatus::Mastered {
        TopicStatus::Learning
    } else {
        current
    }
}

/// Every prerequisite of `node` resolves to a mastered topic
///
/// Unknown prerequisite ids count as unmastered.
pub fn prerequisites_met(graph: &ProgressGraph, node: &TopicNode) -> bool {
    node.prerequisites
        .iter()
        .all(|id| graph.node(id).is_some_and(TopicNode::is_mastered))
}

/// Result of applying one performance sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryChange {
    pub topic_id: String,
    pub previous_mastery: f64,
    pub mastery: f64,
    pub previous_status: TopicStatus,
    pub status: TopicStatus,
}

impl MasteryChange {
    pub fn became_mastered(&self) -> bool {
        self.status == TopicStatus::Mastered && self.previous_status != TopicStatus::Mastered
    }
}

/// Apply one performance sample to a topic
///
/// `performance` is expected in [0, 1] but is not range-checked; only the
/// smoothed result is clamped. Non-finite values are rejected. `time_spent`,
/// when given, is added to the topic's cumulative study time.
pub fn apply_performance(
    graph: &mut ProgressGraph,
    topic_id: &str,
    performance: f64,
    time_spent: Option<f64>,
    now: DateTime<Utc>,
) -> Result<MasteryChange> {
    if !performance.is_finite() {
        return Err(Error::InvalidInput(format!(
            "performance must be a finite number, got {}",
            performance
        )));
    }
    if let Some(minutes) = time_spent {
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(Error::InvalidInput(format!(
                "timeSpent must be a non-negative number, got {}",
                minutes
            )));
        }
    }

    let gate_open = match graph.node(topic_id) {
        Some(node) => prerequisites_met(graph, node),
        None => {
            return Err(Error::NotFound(format!(
                "topic '{}' in progress graph for user '{}'",
                topic_id, graph.user_id
            )))
        }
    };

    let node = graph
        .node_mut(topic_id)
        .ok_or_else(|| Error::Internal(format!("topic '{}' vanished during update", topic_id)))?;

    let previous_mastery = node.mastery;
    let previous_status = node.status;

    node.mastery = smooth_mastery(previous_mastery, performance);
    node.status = derive_status(previous_status, node.mastery, gate_open);
    node.last_studied = Some(now);
    if let Some(minutes) = time_spent {
        node.time_spent += minutes;
    }

    Ok(MasteryChange {
        topic_id: node.id.clone(),
        previous_mastery,
        mastery: node.mastery,
        previous_status,
        status: node.status,
    })
}

/// Unlock the direct dependents of a mastered topic
///
/// Follows edges out of `mastered_topic_id` one hop. A dependent moves from
/// `locked` to `learning` (mastery untouched) when all of its prerequisites are
/// mastered. Does nothing unless the topic itself is currently mastered.
/// Returns the ids that changed; a repeated call returns nothing new.
pub fn unlock_dependents(graph: &mut ProgressGraph, mastered_topic_id: &str) -> Vec<String> {
    match graph.node(mastered_topic_id) {
        Some(node) if node.is_mastered() => {}
        _ => return Vec::new(),
    }

    let mut ready: Vec<String> = Vec::new();
    for dependent_id in graph.dependents_of(mastered_topic_id) {
        let Some(dependent) = graph.node(dependent_id) else {
            continue;
        };
        if !dependent.is_locked() || ready.iter().any(|id| id == dependent_id) {
            continue;
        }
        if prerequisites_met(graph, dependent) {
            ready.push(dependent_id.to_string());
        }
    }

    for id in &ready {
        if let Some(node) = graph.node_mut(id) {
            node.status = TopicStatus::Learning;
        }
    }

    ready
}

/// Topics most in need of reinforcement
///
/// Learning topics below the recommendation ceiling, lowest mastery first,
/// at most [`MAX_RECOMMENDATIONS`].
pub fn recommended_topics(graph: &ProgressGraph) -> Vec<TopicNode> {
    let mut candidates: Vec<&TopicNode> = graph
        .nodes
        .iter()
        .filter(|n| n.status == TopicStatus::Learning && n.mastery < RECOMMENDATION_CEILING)
        .collect();

    candidates.sort_by(|a, b| a.mastery.total_cmp(&b.mastery));

    candidates
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .cloned()
        .collect()
}

/// Analysis output handed over by the material analyzer
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialAnalysis {
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    /// Estimated difficulty in [0, 1]
    #[serde(default)]
    pub difficulty: Option<f64>,
}

impl MaterialAnalysis {
    fn subject_or_default(&self) -> String {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
            .to_string()
    }
}

/// Coarse difficulty bucket for a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn from_score(difficulty: f64) -> Self {
        if difficulty < 0.4 {
            DifficultyLevel::Beginner
        } else if difficulty < 0.7 {
            DifficultyLevel::Intermediate
        } else {
            DifficultyLevel::Advanced
        }
    }
}

/// Append a locked topic for every concept not yet in the graph
///
/// All concepts from one material share the material's prerequisite list
/// (trimmed, deduplicated, minus the concept itself). Each new topic also gets an edge from every
/// prerequisite so that mastering a prerequisite re-checks it. Existing topics
/// are left untouched. Returns the ids added, in payload order.
pub fn add_concept_nodes(graph: &mut ProgressGraph, analysis: &MaterialAnalysis) -> Vec<String> {
    let subject = analysis.subject_or_default();
    let mut added = Vec::new();

    for concept in &analysis.concepts {
        let concept = concept.trim();
        if concept.is_empty() || graph.contains(concept) {
            continue;
        }

        let mut prerequisites: Vec<String> = Vec::new();
        for prerequisite in analysis.prerequisites.iter().map(|p| p.trim()) {
            if prerequisite.is_empty()
                || prerequisite == concept
                || prerequisites.iter().any(|p| p == prerequisite)
            {
                continue;
            }
            prerequisites.push(prerequisite.to_string());
        }

        for prerequisite in &prerequisites {
            if !graph.has_edge(prerequisite, concept) {
                graph
                    .edges
                    .push(Edge::new(prerequisite.clone(), concept, DERIVED_EDGE_STRENGTH));
            }
        }

        graph
            .nodes
            .push(TopicNode::new(concept, subject.clone()).with_prerequisites(prerequisites));
        added.push(concept.to_string());
    }

    added
}

/// Add or re-weight the informational edge `from -> to`
///
/// Returns `false` when the edge already existed with this strength.
pub fn link_topics(graph: &mut ProgressGraph, from: &str, to: &str, strength: f64) -> Result<bool> {
    if from == to {
        return Err(Error::InvalidInput(format!("topic '{}' cannot depend on itself", from)));
    }
    if !strength.is_finite() {
        return Err(Error::InvalidInput(format!(
            "edge strength must be a finite number, got {}",
            strength
        )));
    }
    for id in [from, to] {
        if !graph.contains(id) {
            return Err(Error::NotFound(format!(
                "topic '{}' in progress graph for user '{}'",
                id, graph.user_id
            )));
        }
    }

    match graph.edge_mut(from, to) {
        Some(edge) if edge.strength == strength => Ok(false),
        Some(edge) => {
            edge.strength = strength;
            Ok(true)
        }
        None => {
            graph.edges.push(Edge::new(from, to, strength));
            Ok(true)
        }
    }
}
