//! View transformers
//!
//! Each transformer turns a [`Report`](crate::report::Report) into the data
//! one page needs.

pub mod flamegraph;
pub mod graph;
pub mod listing;
pub mod top;

pub use flamegraph::{build_flame_graph, FlameGraph, TreeNode};
pub use graph::{compose_dot, render_graph, DiagramEngine, DiagramError, GraphView, Graphviz};
pub use listing::render_listing;
pub use top::{top_items, TopItem};
