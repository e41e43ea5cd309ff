//! Flame graph
//!
//! The call-tree report graph is turned into a rooted tree. Nodes with no
//! callers become children of a synthetic `root` node whose value is the sum
//! of theirs.
//!
//! Call paths can be many thousands of frames deep, so the tree lives in a
//! flat arena and is built and written with explicit work stacks.

use sightline_shared::utils::names::shorten_function_name;
use sightline_shared::{Graph, NodeId};
use std::collections::HashSet;

use crate::error::ReportError;
use crate::report::Report;

/// Node of the flame-graph tree. `children` index into [`FlameGraph::tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub full_name: String,
    pub cum: i64,
    pub cum_format: String,
    pub percent: String,
    pub children: Vec<usize>,
}

/// Flame-graph tree with the node names in graph order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlameGraph {
    /// Arena of tree nodes; [`FlameGraph::ROOT`] is the synthetic root
    pub tree: Vec<TreeNode>,
    pub nodes: Vec<String>,
}

impl FlameGraph {
    pub const ROOT: usize = 0;

    pub fn root(&self) -> &TreeNode {
        &self.tree[Self::ROOT]
    }

    pub fn children(&self, node: &TreeNode) -> impl Iterator<Item = &TreeNode> + '_ {
        node.children.clone().into_iter().map(move |id| &self.tree[id])
    }

    /// The tree as nested JSON with the short keys the flame-graph widget
    /// reads: `n`, `f`, `v`, `l`, `p` and `c` (omitted when empty).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        let mut stack: Vec<(usize, usize)> = vec![(Self::ROOT, 0)];
        self.open(&mut out, Self::ROOT)?;

        while let Some(&(id, next)) = stack.last() {
            let children = &self.tree[id].children;
            match children.get(next) {
                Some(&child) => {
                    if next > 0 {
                        out.push(',');
                    }
                    let top = stack.len() - 1;
                    stack[top].1 += 1;
                    self.open(&mut out, child)?;
                    stack.push((child, 0));
                }
                None => {
                    if !children.is_empty() {
                        out.push(']');
                    }
                    out.push('}');
                    stack.pop();
                }
            }
        }
        Ok(out)
    }

    /// Write the fields of `id`, leaving the object (and its `c` array) open.
    fn open(&self, out: &mut String, id: usize) -> Result<(), serde_json::Error> {
        let node = &self.tree[id];
        out.push_str("{\"n\":");
        out.push_str(&serde_json::to_string(&node.name)?);
        out.push_str(",\"f\":");
        out.push_str(&serde_json::to_string(&node.full_name)?);
        out.push_str(&format!(",\"v\":{}", node.cum));
        out.push_str(",\"l\":");
        out.push_str(&serde_json::to_string(&node.cum_format)?);
        out.push_str(",\"p\":");
        out.push_str(&serde_json::to_string(&node.percent)?);
        if !node.children.is_empty() {
            out.push_str(",\"c\":[");
        }
        Ok(())
    }
}

/// Roots first, then everything else, each part in discovery order.
///
/// A root found at position `i` is rotated into the first non-root slot,
/// which keeps the non-root part in order as well.
fn partition_roots(graph: &Graph) -> (Vec<NodeId>, usize) {
    let mut order = Vec::with_capacity(graph.nodes.len());
    let mut roots = 0;
    for node in &graph.nodes {
        order.push(node.id);
        if node.is_root() {
            order[roots..].rotate_right(1);
            roots += 1;
        }
    }
    (order, roots)
}

/// Tree node for `id` without children.
fn leaf(report: &Report, graph: &Graph, id: NodeId) -> TreeNode {
    let node = &graph.nodes[id];
    let full_name = node.info.printable_name();
    TreeNode {
        name: shorten_function_name(&full_name),
        full_name,
        cum: node.cum,
        cum_format: report.format_value(node.cum),
        percent: report.percentage(node.cum).trim().to_string(),
        children: Vec::new(),
    }
}

/// Copy the subtree under graph node `start` into `tree` as a child of
/// `parent`. Graph nodes already on the current path are skipped, so a back
/// edge is cut instead of followed.
fn materialize(
    tree: &mut Vec<TreeNode>,
    lookup: &[TreeNode],
    children: &[Vec<NodeId>],
    parent: usize,
    start: NodeId,
) {
    let mut path: HashSet<NodeId> = HashSet::new();
    // (graph node, tree slot, next child to visit)
    let mut stack: Vec<(NodeId, usize, usize)> = Vec::new();

    let slot = tree.len();
    tree.push(lookup[start].clone());
    tree[parent].children.push(slot);
    path.insert(start);
    stack.push((start, slot, 0));

    while let Some(&(id, slot, next)) = stack.last() {
        let Some(&child) = children[id].get(next) else {
            path.remove(&id);
            stack.pop();
            continue;
        };
        let top = stack.len() - 1;
        stack[top].2 += 1;
        if !path.insert(child) {
            continue;
        }
        let child_slot = tree.len();
        tree.push(lookup[child].clone());
        tree[slot].children.push(child_slot);
        stack.push((child, child_slot, 0));
    }
}

/// Build the flame graph of a call-tree report.
pub fn build_flame_graph(report: &Report) -> Result<FlameGraph, ReportError> {
    let graph = report.graph()?;

    let (order, root_count) = partition_roots(graph);
    let roots = &order[..root_count];

    // Every tree node exists before any child is wired.
    let lookup: Vec<TreeNode> = (0..graph.nodes.len())
        .map(|id| leaf(report, graph, id))
        .collect();
    let children: Vec<Vec<NodeId>> = graph
        .nodes
        .iter()
        .map(|n| n.out_edges.iter().map(|e| e.dest).collect())
        .collect();

    let root_value = roots
        .iter()
        .fold(0i64, |sum, &id| sum.saturating_add(graph.nodes[id].cum));
    let mut tree = vec![TreeNode {
        name: "root".to_string(),
        full_name: "root".to_string(),
        cum: root_value,
        cum_format: report.format_value(root_value),
        percent: report.percentage(root_value).trim().to_string(),
        children: Vec::with_capacity(roots.len()),
    }];
    for &id in roots {
        materialize(&mut tree, &lookup, &children, FlameGraph::ROOT, id);
    }

    let nodes = graph.nodes.iter().map(|n| n.info.name.clone()).collect();
    Ok(FlameGraph { tree, nodes })
}
