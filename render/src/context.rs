//! Process-wide dependencies handed to everything that loads or renders

use std::sync::Arc;

use crate::config::ServerSettings;
use crate::engine::{Engine, StackEngine};
use crate::source::{DefaultSource, ProfileSource};
use crate::transport::Transport;
use crate::views::{DiagramEngine, Graphviz};

/// Shared services of one process.
#[derive(Clone)]
pub struct AppContext {
    pub settings: ServerSettings,
    pub transport: Transport,
    pub source: Arc<dyn ProfileSource>,
    pub engine: Arc<dyn Engine>,
    pub diagram: Arc<dyn DiagramEngine>,
}

impl AppContext {
    /// Context with the default source, engine and Graphviz diagram engine.
    pub fn new(settings: ServerSettings) -> Self {
        let transport = Transport::shared();
        let mut engine = StackEngine::new();
        if let Some(root) = &settings.source_root {
            engine = engine.with_source_root(root);
        }
        Self {
            source: Arc::new(DefaultSource::new(transport.clone())),
            engine: Arc::new(engine),
            diagram: Arc::new(Graphviz::new(&settings.dot_path)),
            transport,
            settings,
        }
    }

    pub fn with_diagram(mut self, diagram: Arc<dyn DiagramEngine>) -> Self {
        self.diagram = diagram;
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ProfileSource>) -> Self {
        self.source = source;
        self
    }
}
