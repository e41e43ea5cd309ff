//! Render dispatch
//!
//! [`WebUi`] owns one loaded profile and turns `(view, query)` pairs into
//! serialized view payloads. Each view resolves its configuration, runs the
//! report generator, hands the report to its transformer and then gets the
//! shared page chrome injected in [`WebUi::finish`].

use serde::{Deserialize, Serialize};
use sightline_shared::{Profile, ProfileSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{resolve, EffectiveConfig, Granularity, QueryParams};
use crate::context::AppContext;
use crate::engine::Engine;
use crate::error::{Error, RenderError};
use crate::help::help_text;
use crate::metrics;
use crate::report::{generate, Generated, Report};
use crate::settings::{config_menu, load_configs, ConfigMenuEntry, NamedConfig};
use crate::views::{build_flame_graph, render_graph, render_listing, top_items, DiagramEngine, TopItem};
use crate::{MAX_ENTRIES, TOP_NODE_COUNT};

/// Render callback handed to the host: raw query string in, payload out.
pub type RenderFn = Arc<dyn Fn(&str) -> Result<RenderedView, Error> + Send + Sync>;

// ── Views ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Graph,
    Top,
    Disasm,
    Source,
    Peek,
    FlameGraph,
}

impl View {
    /// View for a route or command name; anything unrecognized is the graph.
    pub fn from_name(name: &str) -> Self {
        match name {
            "top" => View::Top,
            "disasm" => View::Disasm,
            "source" => View::Source,
            "peek" => View::Peek,
            "flamegraph" => View::FlameGraph,
            _ => View::Graph,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            View::Graph => "graph",
            View::Top => "top",
            View::Disasm => "disasm",
            View::Source => "source",
            View::Peek => "peek",
            View::FlameGraph => "flamegraph",
        }
    }

    /// Template a front end uses to present the payload
    pub fn template(&self) -> &'static str {
        match self {
            View::Graph => "graph",
            View::Top => "top",
            View::Disasm | View::Peek => "plaintext",
            View::Source => "sourcelisting",
            View::FlameGraph => "flamegraph",
        }
    }

    pub const ALL: [View; 6] = [
        View::Graph,
        View::Top,
        View::Disasm,
        View::Source,
        View::Peek,
        View::FlameGraph,
    ];
}

// ── Payload ──────────────────────────────────────────────────────────────────

/// Links to sibling views and downloads, shown on every page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLinks {
    pub top_url: String,
    pub graph_url: String,
    pub flamegraph_url: String,
    pub peek_url: String,
    pub source_url: String,
    pub disasm_url: String,
    pub sample_url: String,
    pub cpu_url: String,
    pub download_url: String,
}

impl RenderLinks {
    /// Links matching the routes of the built-in server.
    pub fn local() -> Self {
        Self {
            top_url: "./top".to_string(),
            graph_url: "./".to_string(),
            flamegraph_url: "./flamegraph".to_string(),
            peek_url: "./peek".to_string(),
            source_url: "./source".to_string(),
            disasm_url: "./disasm".to_string(),
            sample_url: String::new(),
            cpu_url: String::new(),
            download_url: "./download".to_string(),
        }
    }
}

/// View-specific part of a payload.
#[derive(Debug, Default)]
struct Body {
    legend: Vec<String>,
    nodes: Vec<String>,
    svg: Option<String>,
    text: Option<String>,
    top: Vec<TopItem>,
    flame_graph: Option<String>,
}

#[derive(Debug, Serialize)]
struct ViewData<'a> {
    title: String,
    errors: Vec<String>,
    total: i64,
    sample_types: Vec<String>,
    legend: Vec<String>,
    help: &'a BTreeMap<String, String>,
    configs: Vec<ConfigMenuEntry>,
    #[serde(flatten)]
    links: &'a RenderLinks,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nodes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    svg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    top: Vec<TopItem>,
    /// Flame graph tree, already serialized
    #[serde(skip_serializing_if = "Option::is_none")]
    flame_graph: Option<String>,
}

/// A fully serialized view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub template: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl RenderedView {
    /// Body decoded as JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

// ── WebUi ────────────────────────────────────────────────────────────────────

/// One loaded profile together with everything needed to render it.
pub struct WebUi {
    profile: ProfileSnapshot,
    /// Profile combined with a normalized copy of itself, when a base exists
    normalized: Option<ProfileSnapshot>,
    engine: Arc<dyn Engine>,
    diagram: Arc<dyn DiagramEngine>,
    base_config: EffectiveConfig,
    configs: Vec<NamedConfig>,
    help: BTreeMap<String, String>,
    links: RenderLinks,
}

impl WebUi {
    /// UI over `profile` using the context's engine, diagram engine and
    /// saved configurations.
    pub fn new(profile: Profile, ctx: &AppContext) -> Self {
        Self {
            profile: ProfileSnapshot::new(profile),
            normalized: None,
            engine: Arc::clone(&ctx.engine),
            diagram: Arc::clone(&ctx.diagram),
            base_config: ctx.settings.base_config(),
            configs: load_configs(ctx.settings.settings_file.as_deref()),
            help: help_text(),
            links: RenderLinks::default(),
        }
    }

    /// Mark the profile as combined with a base; `normalized` is the same
    /// combination computed after scaling to the base's totals.
    pub fn with_base(mut self, normalized: Profile) -> Self {
        self.normalized = Some(ProfileSnapshot::new(normalized));
        self
    }

    pub fn with_links(mut self, links: RenderLinks) -> Self {
        self.links = links;
        self
    }

    pub fn has_base(&self) -> bool {
        self.normalized.is_some()
    }

    /// The profile as loaded (combined with the base, if any)
    pub fn profile(&self) -> Arc<Profile> {
        self.profile.snapshot()
    }

    /// Render `view` for the raw `query` string.
    pub fn render(&self, view: View, query: &str) -> Result<RenderedView, Error> {
        let timer = metrics::RENDER_DURATION
            .with_label_values(&[view.name()])
            .start_timer();
        let result = self.render_view(view, &QueryParams::parse(query));
        timer.observe_duration();

        let status = match &result {
            Ok(_) => "ok",
            Err(e) => {
                warn!(
                    "Render of {} failed ({}): {}",
                    view.name(),
                    e.status_code().as_u16(),
                    e
                );
                e.kind()
            }
        };
        metrics::RENDER_TOTAL
            .with_label_values(&[view.name(), status])
            .inc();
        result
    }

    /// Callback rendering `view` on every call.
    pub fn render_func(self: &Arc<Self>, view: View) -> RenderFn {
        let ui = Arc::clone(self);
        Arc::new(move |query: &str| ui.render(view, query))
    }

    fn render_view(&self, view: View, query: &QueryParams) -> Result<RenderedView, Error> {
        let focus = query.get("f").unwrap_or_default();
        match view {
            View::Graph => {
                let (generated, cfg) = self.make_report(query, &["svg"], None)?;
                let graph = render_graph(&generated.report, self.diagram.as_ref())?;
                let body = Body {
                    legend: generated.report.labels.clone(),
                    nodes: graph.nodes,
                    svg: Some(graph.svg),
                    ..Default::default()
                };
                self.finish(view, query, cfg, generated, body)
            }
            View::Top => {
                let edit = |c: &mut EffectiveConfig| c.node_count = Some(TOP_NODE_COUNT);
                let (generated, cfg) = self.make_report(query, &["top"], Some(&edit))?;
                let top = top_items(&generated.report, cfg.node_count)?;
                let body = Body {
                    legend: generated.report.labels.clone(),
                    nodes: top.iter().map(|item| item.name.clone()).collect(),
                    top,
                    ..Default::default()
                };
                self.finish(view, query, cfg, generated, body)
            }
            View::Disasm | View::Source | View::Peek => {
                let command = match view {
                    View::Disasm => "disasm",
                    View::Source => "weblist",
                    _ => "peek",
                };
                let lines = |c: &mut EffectiveConfig| c.granularity = Granularity::Lines;
                let edit: Option<&dyn Fn(&mut EffectiveConfig)> = match view {
                    View::Peek => Some(&lines),
                    _ => None,
                };
                let (generated, cfg) = self.make_report(query, &[command, focus], edit)?;
                let text = render_listing(&generated.report, MAX_ENTRIES)?;
                let body = Body {
                    legend: generated.report.labels.clone(),
                    text: Some(text),
                    ..Default::default()
                };
                self.finish(view, query, cfg, generated, body)
            }
            View::FlameGraph => {
                let edit = |c: &mut EffectiveConfig| {
                    c.call_tree = true;
                    c.trim = false;
                };
                let (generated, cfg) = self.make_report(query, &["svg"], Some(&edit))?;
                let tree = build_flame_graph(&generated.report)?;
                let json = tree.to_json().map_err(RenderError::from)?;
                let body = Body {
                    legend: generated.report.labels.clone(),
                    nodes: tree.nodes,
                    flame_graph: Some(json),
                    ..Default::default()
                };
                self.finish(view, query, cfg, generated, body)
            }
        }
    }

    /// Resolve the configuration for this request and build the report.
    fn make_report(
        &self,
        query: &QueryParams,
        command: &[&str],
        edit: Option<&dyn Fn(&mut EffectiveConfig)>,
    ) -> Result<(Generated, EffectiveConfig), Error> {
        let cfg = resolve(&self.base_config, query, edit, self.has_base())?;
        let snapshot = match (&self.normalized, cfg.normalize) {
            (Some(normalized), true) => normalized.snapshot(),
            _ => self.profile.snapshot(),
        };
        let generated = generate(&snapshot, command, &cfg, self.engine.as_ref())?;
        Ok((generated, cfg))
    }

    /// Inject the page chrome and serialize.
    fn finish(
        &self,
        view: View,
        query: &QueryParams,
        cfg: EffectiveConfig,
        generated: Generated,
        body: Body,
    ) -> Result<RenderedView, Error> {
        let Generated { report, warnings } = generated;
        // The menu compares against the request's configuration, not the
        // view's forced edits.
        let request_cfg = resolve(&self.base_config, query, None, self.has_base())?;
        debug!(
            "Finishing {} view: {} node names, node_count {:?}",
            view.name(),
            body.nodes.len(),
            cfg.node_count
        );

        let data = ViewData {
            title: title(&report),
            errors: warnings,
            total: report.total,
            sample_types: self.profile.snapshot().sample_type_names(),
            legend: body.legend,
            help: &self.help,
            configs: config_menu(&self.configs, &request_cfg),
            links: &self.links,
            nodes: body.nodes,
            svg: body.svg,
            text_body: body.text,
            top: body.top,
            flame_graph: body.flame_graph,
        };
        let body = serde_json::to_vec(&data).map_err(RenderError::from)?;
        Ok(RenderedView {
            template: view.template(),
            content_type: "application/json",
            body,
        })
    }
}

fn title(report: &Report) -> String {
    format!(
        "{} {}",
        report.label_value("File:").unwrap_or("unknown"),
        report.label_value("Type:").unwrap_or("unknown")
    )
}
