//! HTTP API handlers for amber-progress

pub mod buildinfo;
pub mod concepts;
pub mod health;
pub mod progress;
pub mod sse;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use progress::progress_routes;
pub use sse::event_stream;
