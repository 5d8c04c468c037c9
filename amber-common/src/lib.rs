//! # AMBERLEAR Common Library
//!
//! Shared code for AMBERLEAR services including:
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - Database initialization and schema
//! - Progress graph document types
//! - Progress event types and the broadcast EventBus
//! - SSE helpers
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, ProgressEvent};
pub use models::{Edge, ProgressGraph, TopicNode, TopicStatus};
