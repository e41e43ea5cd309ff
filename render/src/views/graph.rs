//! Call-graph diagram
//!
//! The report graph is written as DOT and handed to a [`DiagramEngine`]
//! (Graphviz by default) for layout. The node-name array lets the page map
//! diagram nodes `N1..Nn` back to graph nodes.

use sightline_shared::utils::names::shorten_function_name;
use sightline_shared::Graph;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command as Process, Stdio};
use thiserror::Error;

use crate::error::{Error, RenderError};
use crate::report::Report;

#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("could not execute {tool}: {source}")]
    ToolMissing {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {message}")]
    Failed { tool: String, message: String },
}

impl From<DiagramError> for RenderError {
    fn from(e: DiagramError) -> Self {
        match e {
            DiagramError::ToolMissing { .. } => RenderError::DiagramToolMissing,
            DiagramError::Failed { message, .. } => RenderError::Diagram(message),
        }
    }
}

/// Lays out a DOT document.
pub trait DiagramEngine: Send + Sync {
    fn to_diagram(&self, dot: &[u8]) -> Result<Vec<u8>, DiagramError>;
}

/// Runs Graphviz `dot -Tsvg`.
#[derive(Debug, Clone)]
pub struct Graphviz {
    program: PathBuf,
}

impl Graphviz {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn tool(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for Graphviz {
    fn default() -> Self {
        Self::new("dot")
    }
}

impl DiagramEngine for Graphviz {
    fn to_diagram(&self, dot: &[u8]) -> Result<Vec<u8>, DiagramError> {
        let mut child = Process::new(&self.program)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DiagramError::ToolMissing {
                tool: self.tool(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(dot).map_err(|e| DiagramError::Failed {
                tool: self.tool(),
                message: e.to_string(),
            })?;
        }
        let output = child.wait_with_output().map_err(|e| DiagramError::Failed {
            tool: self.tool(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(DiagramError::Failed {
                tool: self.tool(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output.stdout)
    }
}

/// Rendered diagram plus the node-name correlation array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphView {
    pub svg: String,
    /// Index 0 is empty; index `i` names diagram node `Ni`
    pub nodes: Vec<String>,
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Split a long name on its separators so the box stays narrow.
fn multiline(name: &str) -> String {
    let mut out = String::new();
    let mut width = 0;
    for part in name.split_inclusive(|c: char| matches!(c, '.' | ' ' | ':' | '/')) {
        if width > 0 && width + part.len() > 16 {
            out.push_str("\\n");
            width = 0;
        }
        out.push_str(&escape(part));
        width += part.len();
    }
    out
}

/// `value` scaled from `0..=max` onto `0..=range`.
fn scaled(value: u64, max: u64, range: u64) -> u64 {
    (u128::from(value) * u128::from(range) / u128::from(max.max(1))) as u64
}

/// Write the report graph as a DOT document, nodes numbered in graph order.
///
/// The legend is not part of the document; it travels next to the diagram.
pub fn compose_dot(report: &Report, graph: &Graph) -> String {
    let max_flat = graph
        .nodes
        .iter()
        .map(|n| n.flat.unsigned_abs())
        .max()
        .unwrap_or(0);
    let max_edge = graph
        .nodes
        .iter()
        .flat_map(|n| n.out_edges.iter())
        .map(|e| e.weight.unsigned_abs())
        .max()
        .unwrap_or(0);

    let mut out = String::from("digraph \"unnamed\" {\n");
    out += "node [style=filled fillcolor=\"#f8f8f8\"]\n";

    for node in &graph.nodes {
        let full_name = node.info.printable_name();
        let mut label = multiline(&shorten_function_name(&full_name));
        label += &format!(
            "\\n{} ({})",
            report.format_value(node.flat),
            report.percentage(node.flat).trim()
        );
        if node.cum != node.flat {
            label += &format!(
                "\\nof {} ({})",
                report.format_value(node.cum),
                report.percentage(node.cum).trim()
            );
        }
        let fontsize = 8 + scaled(node.flat.unsigned_abs(), max_flat, 32);
        out += &format!(
            "N{} [label=\"{}\" id=\"node{}\" fontsize={} shape=box tooltip=\"{} ({})\"]\n",
            node.id + 1,
            label,
            node.id + 1,
            fontsize,
            escape(&full_name),
            report.format_value(node.cum)
        );
    }

    for node in &graph.nodes {
        for edge in node.out_edges.iter() {
            let weight = edge.weight.unsigned_abs();
            let penwidth = 1 + scaled(weight, max_edge, 5);
            let style = if edge.inline { " style=\"dashed\"" } else { "" };
            out += &format!(
                "N{} -> N{} [label=\" {}\" weight={} penwidth={}{} tooltip=\"{} -> {} ({})\"]\n",
                edge.src + 1,
                edge.dest + 1,
                report.format_value(edge.weight),
                scaled(weight, max_edge, 100).max(1),
                penwidth,
                style,
                escape(&graph.nodes[edge.src].info.printable_name()),
                escape(&graph.nodes[edge.dest].info.printable_name()),
                report.format_value(edge.weight)
            );
        }
    }
    out += "}\n";
    out
}

/// Lay out the report graph and build the node-name array.
pub fn render_graph(report: &Report, diagram: &dyn DiagramEngine) -> Result<GraphView, Error> {
    let graph = report.graph()?;
    let dot = compose_dot(report, graph);
    let svg = diagram
        .to_diagram(dot.as_bytes())
        .map_err(RenderError::from)?;

    let nodes = std::iter::once(String::new())
        .chain(graph.nodes.iter().map(|n| n.info.name.clone()))
        .collect();
    Ok(GraphView {
        svg: String::from_utf8_lossy(&svg).into_owned(),
        nodes,
    })
}
