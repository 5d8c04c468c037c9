//! Progress tracker service
//!
//! Runs the graph rules in [`crate::engine`] against persisted graphs. Each
//! operation that writes holds the user's lock for its whole duration and goes
//! through [`ProgressTracker::modify`], which retries on version conflicts
//! caused by writers outside this process.

use amber_common::{Error, EventBus, ProgressEvent, ProgressGraph, Result, TopicNode};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db;
use crate::engine::{self, MasteryChange, MaterialAnalysis};
use crate::locks::UserLocks;

/// Result of `update_mastery`: the mastery change plus the follow-up unlocks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryOutcome {
    #[serde(flatten)]
    pub change: MasteryChange,
    pub unlocked: Vec<String>,
}

#[derive(Clone)]
pub struct ProgressTracker {
    db: SqlitePool,
    events: EventBus,
    locks: UserLocks,
    max_write_attempts: u32,
}

impl ProgressTracker {
    pub fn new(db: SqlitePool, events: EventBus, max_write_attempts: u32) -> Self {
        Self {
            db,
            events,
            locks: UserLocks::new(),
            max_write_attempts: max_write_attempts.max(1),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create an empty graph for a new learner
    ///
    /// Idempotent: an existing graph is returned unchanged. The flag reports
    /// whether this call created it.
    pub async fn create_graph(&self, user_id: &str) -> Result<(ProgressGraph, bool)> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".to_string()));
        }

        let _guard = self.locks.acquire(user_id).await;

        let created = db::insert_graph(&self.db, &ProgressGraph::empty(user_id)).await?;
        if created {
            info!("Created progress graph for {}", user_id);
            self.events.emit(ProgressEvent::GraphCreated {
                user_id: user_id.to_string(),
                timestamp: amber_common::time::now(),
            });
        }

        let graph = self.get_graph(user_id).await?;
        Ok((graph, created))
    }

    pub async fn get_graph(&self, user_id: &str) -> Result<ProgressGraph> {
        db::load_graph(&self.db, user_id)
            .await?
            .ok_or_else(|| not_found(user_id))
    }

    /// Fold a performance sample into a topic's mastery, then unlock dependents
    ///
    /// The unlock pass runs on the graph the mastery change produced, and both
    /// land in one versioned write: either the caller sees both effects or
    /// nothing is stored.
    pub async fn update_mastery(
        &self,
        user_id: &str,
        topic_id: &str,
        performance: f64,
        time_spent: Option<f64>,
    ) -> Result<MasteryOutcome> {
        let _guard = self.locks.acquire(user_id).await;

        let (outcome, _) = self
            .modify(user_id, |graph| {
                let change = engine::apply_performance(
                    graph,
                    topic_id,
                    performance,
                    time_spent,
                    amber_common::time::now(),
                )?;
                let unlocked = engine::unlock_dependents(graph, topic_id);
                Ok(MasteryOutcome { change, unlocked })
            })
            .await?;

        let change = &outcome.change;
        debug!(
            "{}: {} mastery {:.4} -> {:.4} ({} -> {})",
            user_id,
            topic_id,
            change.previous_mastery,
            change.mastery,
            change.previous_status,
            change.status
        );
        if change.became_mastered() {
            info!("{}: mastered {}", user_id, topic_id);
        }
        self.events.emit(ProgressEvent::MasteryUpdated {
            user_id: user_id.to_string(),
            topic_id: change.topic_id.clone(),
            mastery: change.mastery,
            status: change.status,
            timestamp: amber_common::time::now(),
        });
        self.emit_unlocked(user_id, topic_id, &outcome.unlocked);

        Ok(outcome)
    }

    /// Unlock direct dependents of a mastered topic
    ///
    /// Safe to repeat: a second call with no mastery change in between writes
    /// nothing and returns an empty list.
    pub async fn unlock_dependents(&self, user_id: &str, topic_id: &str) -> Result<Vec<String>> {
        let _guard = self.locks.acquire(user_id).await;

        let (unlocked, _) = self
            .modify(user_id, |graph| Ok(engine::unlock_dependents(graph, topic_id)))
            .await?;
        self.emit_unlocked(user_id, topic_id, &unlocked);

        Ok(unlocked)
    }

    fn emit_unlocked(&self, user_id: &str, topic_id: &str, unlocked: &[String]) {
        if unlocked.is_empty() {
            return;
        }
        info!("{}: mastering {} unlocked {:?}", user_id, topic_id, unlocked);
        self.events.emit(ProgressEvent::TopicsUnlocked {
            user_id: user_id.to_string(),
            mastered_topic_id: topic_id.to_string(),
            unlocked: unlocked.to_vec(),
            timestamp: amber_common::time::now(),
        });
    }

    /// Up to three learning topics with the lowest mastery
    ///
    /// A learner without a graph simply has no recommendations.
    pub async fn recommended_topics(&self, user_id: &str) -> Result<Vec<TopicNode>> {
        Ok(db::load_graph(&self.db, user_id)
            .await?
            .map(|graph| engine::recommended_topics(&graph))
            .unwrap_or_default())
    }

    /// Add topics for newly discovered concepts of an analyzed material
    ///
    /// Persists once for the whole material. Returns the ids added.
    pub async fn add_concept_nodes(
        &self,
        user_id: &str,
        analysis: &MaterialAnalysis,
    ) -> Result<Vec<String>> {
        let _guard = self.locks.acquire(user_id).await;

        let (added, _) = self
            .modify(user_id, |graph| Ok(engine::add_concept_nodes(graph, analysis)))
            .await?;

        if !added.is_empty() {
            info!("{}: added {} concept topics", user_id, added.len());
            self.events.emit(ProgressEvent::ConceptNodesAdded {
                user_id: user_id.to_string(),
                added: added.clone(),
                timestamp: amber_common::time::now(),
            });
        }

        Ok(added)
    }

    /// Add or re-weight the edge `from -> to`
    pub async fn link_topics(
        &self,
        user_id: &str,
        from: &str,
        to: &str,
        strength: f64,
    ) -> Result<ProgressGraph> {
        let _guard = self.locks.acquire(user_id).await;

        let (changed, graph) = self
            .modify(user_id, |graph| engine::link_topics(graph, from, to, strength))
            .await?;

        if changed {
            self.events.emit(ProgressEvent::TopicsLinked {
                user_id: user_id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                strength,
                timestamp: amber_common::time::now(),
            });
        }

        Ok(graph)
    }

    /// Load, mutate and save a graph, retrying on version conflicts
    ///
    /// `apply` runs against a fresh copy on every attempt. A mutation that
    /// leaves the graph unchanged is not written. Callers hold the user lock.
    async fn modify<T, F>(&self, user_id: &str, mut apply: F) -> Result<(T, ProgressGraph)>
    where
        F: FnMut(&mut ProgressGraph) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            let mut graph = db::load_graph(&self.db, user_id)
                .await?
                .ok_or_else(|| not_found(user_id))?;
            let before = graph.clone();

            let output = apply(&mut graph)?;
            if graph == before {
                return Ok((output, graph));
            }

            match db::save_graph(&self.db, &mut graph).await {
                Ok(()) => return Ok((output, graph)),
                Err(e) if e.is_conflict() && attempt < self.max_write_attempts => {
                    warn!(
                        "{}: write conflict on attempt {}/{}, retrying",
                        user_id, attempt, self.max_write_attempts
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn not_found(user_id: &str) -> Error {
    Error::NotFound(format!("progress graph for user '{}'", user_id))
}
