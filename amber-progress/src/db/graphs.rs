//! Progress graph persistence
//!
//! Each graph is one row of `progress_graphs` with `nodes` and `edges` stored
//! as JSON. Writes are guarded by the row's `version`: an update only applies
//! when the stored version still matches the one that was read.

use amber_common::{Error, ProgressGraph, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

type GraphRow = (String, String, String, i64, DateTime<Utc>);

fn from_row(row: GraphRow) -> Result<ProgressGraph> {
    let (user_id, nodes, edges, version, updated_at) = row;
    Ok(ProgressGraph {
        user_id,
        nodes: serde_json::from_str(&nodes)?,
        edges: serde_json::from_str(&edges)?,
        updated_at,
        version,
    })
}

/// Insert a new graph row
///
/// Returns `false` without touching anything if the user already has a graph.
pub async fn insert_graph(pool: &SqlitePool, graph: &ProgressGraph) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO progress_graphs (user_id, nodes, edges, version, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&graph.user_id)
    .bind(serde_json::to_string(&graph.nodes)?)
    .bind(serde_json::to_string(&graph.edges)?)
    .bind(graph.version)
    .bind(graph.updated_at)
    .bind(graph.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load a user's graph
pub async fn load_graph(pool: &SqlitePool, user_id: &str) -> Result<Option<ProgressGraph>> {
    let row: Option<GraphRow> = sqlx::query_as(
        "SELECT user_id, nodes, edges, version, updated_at FROM progress_graphs WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(from_row).transpose()
}

/// Write a modified graph back if nobody else wrote it since it was loaded
///
/// On success `graph.version` is incremented and `graph.updated_at` set to now.
/// A stale version yields [`Error::Conflict`]; a vanished row yields
/// [`Error::NotFound`].
pub async fn save_graph(pool: &SqlitePool, graph: &mut ProgressGraph) -> Result<()> {
    let expected_version = graph.version;
    let next_version = expected_version + 1;
    let now = amber_common::time::now();

    let result = sqlx::query(
        r#"
        UPDATE progress_graphs
        SET nodes = ?, edges = ?, version = ?, updated_at = ?
        WHERE user_id = ? AND version = ?
        "#,
    )
    .bind(serde_json::to_string(&graph.nodes)?)
    .bind(serde_json::to_string(&graph.edges)?)
    .bind(next_version)
    .bind(now)
    .bind(&graph.user_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT version FROM progress_graphs WHERE user_id = ?")
                .bind(&graph.user_id)
                .fetch_optional(pool)
                .await?;

        return Err(match exists {
            Some(current) => Error::Conflict(format!(
                "progress graph for user '{}' is at version {}, expected {}",
                graph.user_id, current, expected_version
            )),
            None => Error::NotFound(format!("progress graph for user '{}'", graph.user_id)),
        });
    }

    debug!(
        "Saved progress graph for {} (version {} -> {})",
        graph.user_id, expected_version, next_version
    );
    graph.version = next_version;
    graph.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amber_common::{Edge, TopicNode};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        amber_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_and_load_round_trip() {
        let pool = test_pool().await;
        let mut graph = ProgressGraph::empty("u1");
        graph.nodes.push(TopicNode::new("algebra-1", "Math"));
        graph.edges.push(Edge::new("algebra-1", "algebra-2", 0.5));

        assert!(insert_graph(&pool, &graph).await.unwrap());
        let loaded = load_graph(&pool, "u1").await.unwrap().unwrap();

        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.nodes, graph.nodes);
        assert_eq!(loaded.edges, graph.edges);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_insert_twice_keeps_first() {
        let pool = test_pool().await;
        let mut first = ProgressGraph::empty("u1");
        first.nodes.push(TopicNode::new("kept", "Math"));

        assert!(insert_graph(&pool, &first).await.unwrap());
        assert!(!insert_graph(&pool, &ProgressGraph::empty("u1")).await.unwrap());

        let loaded = load_graph(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let pool = test_pool().await;
        assert!(load_graph(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let pool = test_pool().await;
        insert_graph(&pool, &ProgressGraph::empty("u1")).await.unwrap();

        let mut graph = load_graph(&pool, "u1").await.unwrap().unwrap();
        graph.nodes.push(TopicNode::new("t", "Math"));
        save_graph(&pool, &mut graph).await.unwrap();
        assert_eq!(graph.version, 1);

        let loaded = load_graph(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let pool = test_pool().await;
        insert_graph(&pool, &ProgressGraph::empty("u1")).await.unwrap();

        let mut a = load_graph(&pool, "u1").await.unwrap().unwrap();
        let mut b = load_graph(&pool, "u1").await.unwrap().unwrap();

        a.nodes.push(TopicNode::new("from-a", "Math"));
        save_graph(&pool, &mut a).await.unwrap();

        b.nodes.push(TopicNode::new("from-b", "Math"));
        let result = save_graph(&pool, &mut b).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        let loaded = load_graph(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.nodes.len(), 1);
        assert_eq!(loaded.nodes[0].id, "from-a");
    }

    #[tokio::test]
    async fn test_save_missing_row_is_not_found() {
        let pool = test_pool().await;
        let mut graph = ProgressGraph::empty("ghost");
        let result = save_graph(&pool, &mut graph).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
