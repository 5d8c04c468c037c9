//! Database access layer for amber-progress

pub mod graphs;

pub use graphs::{insert_graph, load_graph, save_graph};
