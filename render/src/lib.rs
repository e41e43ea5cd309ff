//! Sightline report-view rendering
//!
//! Turns a loaded profile plus a request query into one of the web views:
//! call-graph diagram, top table, flame graph, or an annotated text listing
//! (peek, disassembly, source).

pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod help;
pub mod metrics;
pub mod proto;
pub mod report;
pub mod server;
pub mod settings;
pub mod source;
pub mod transport;
pub mod views;

pub use config::{EffectiveConfig, Granularity, ServerSettings};
pub use context::AppContext;
pub use dispatch::{RenderLinks, RenderedView, View, WebUi};
pub use error::{ConfigError, Error, RenderError, ReportError, SourceError};
pub use server::handler::{get_render_func, DiffOptions, RenderFn};

/// Maximum number of entries written by the text listing views
pub const MAX_ENTRIES: usize = 50_000;

/// Node count used by the top view
pub const TOP_NODE_COUNT: usize = 500;
