//! Call-graph construction and trimming

use sightline_shared::utils::measurement::percentage;
use sightline_shared::{Frame, Graph, Node, NodeId, NodeInfo};
use std::collections::{HashMap, HashSet};

use crate::config::{EffectiveConfig, Granularity};
use crate::report::{Command, ValueFormat};

/// Node count kept by graph commands when trimming without an explicit count
pub const DEFAULT_GRAPH_NODE_COUNT: usize = 80;

/// One sample after filtering.
pub(crate) struct Selected<'a> {
    /// Frames, leaf first
    pub frames: Vec<&'a Frame>,
    pub value: i64,
    /// Mean divisor contributed by this sample
    pub div: i64,
}

/// Key of the node a frame is aggregated into.
pub(crate) fn node_info(frame: &Frame, granularity: Granularity) -> NodeInfo {
    if !frame.is_symbolized() {
        return NodeInfo {
            address: Some(frame.address),
            objfile: frame.module.clone(),
            ..Default::default()
        };
    }
    let name = frame.function.clone().unwrap_or_default();
    match granularity {
        Granularity::Functions => NodeInfo::named(name),
        Granularity::FileFunctions => NodeInfo {
            name,
            file: frame.file.clone(),
            ..Default::default()
        },
        Granularity::Files => NodeInfo {
            file: frame.file.clone(),
            objfile: frame.module.clone(),
            ..Default::default()
        },
        Granularity::Lines => NodeInfo {
            name,
            file: frame.file.clone(),
            line: frame.line,
            ..Default::default()
        },
        Granularity::Addresses => NodeInfo {
            name,
            file: frame.file.clone(),
            line: frame.line,
            address: Some(frame.address),
            objfile: None,
        },
    }
}

struct NodeAcc {
    info: NodeInfo,
    flat: i64,
    flat_div: i64,
    cum: i64,
    cum_div: i64,
    inlined: bool,
}

struct EdgeAcc {
    src: usize,
    dest: usize,
    weight: i64,
    div: i64,
    inline: bool,
}

fn mean_value(value: i64, div: i64, mean: bool) -> i64 {
    if mean && div != 0 {
        value.saturating_div(div)
    } else {
        value
    }
}

/// Aggregate samples into a graph ranked by flat, then cum, then name.
///
/// With `call_tree`, nodes are keyed by their parent too, so each call path
/// becomes its own node. Each node and edge counts once per sample.
pub(crate) fn build_graph(
    samples: &[Selected<'_>],
    granularity: Granularity,
    call_tree: bool,
    mean: bool,
) -> Graph {
    let mut nodes: Vec<NodeAcc> = Vec::new();
    let mut node_index: HashMap<(Option<usize>, NodeInfo), usize> = HashMap::new();
    let mut edges: Vec<EdgeAcc> = Vec::new();
    let mut edge_index: HashMap<(usize, usize), usize> = HashMap::new();

    for sample in samples {
        let mut seen_nodes = HashSet::new();
        let mut seen_edges = HashSet::new();
        let mut parent: Option<usize> = None;

        for frame in sample.frames.iter().rev() {
            let key = (
                if call_tree { parent } else { None },
                node_info(frame, granularity),
            );
            let id = match node_index.get(&key) {
                Some(&id) => id,
                None => {
                    let id = nodes.len();
                    nodes.push(NodeAcc {
                        info: key.1.clone(),
                        flat: 0,
                        flat_div: 0,
                        cum: 0,
                        cum_div: 0,
                        inlined: true,
                    });
                    node_index.insert(key, id);
                    id
                }
            };
            let node = &mut nodes[id];
            node.inlined &= frame.inlined;
            if seen_nodes.insert(id) {
                node.cum = node.cum.saturating_add(sample.value);
                node.cum_div = node.cum_div.saturating_add(sample.div);
            }

            if let Some(p) = parent.filter(|&p| p != id) {
                if seen_edges.insert((p, id)) {
                    let e = *edge_index.entry((p, id)).or_insert_with(|| {
                        edges.push(EdgeAcc {
                            src: p,
                            dest: id,
                            weight: 0,
                            div: 0,
                            inline: true,
                        });
                        edges.len() - 1
                    });
                    let edge = &mut edges[e];
                    edge.weight = edge.weight.saturating_add(sample.value);
                    edge.div = edge.div.saturating_add(sample.div);
                    edge.inline &= frame.inlined;
                }
            }
            parent = Some(id);
        }

        if let Some(leaf) = parent {
            let leaf = &mut nodes[leaf];
            leaf.flat = leaf.flat.saturating_add(sample.value);
            leaf.flat_div = leaf.flat_div.saturating_add(sample.div);
        }
    }

    let values: Vec<(i64, i64)> = nodes
        .iter()
        .map(|n| {
            (
                mean_value(n.flat, n.flat_div, mean),
                mean_value(n.cum, n.cum_div, mean),
            )
        })
        .collect();
    let names: Vec<String> = nodes.iter().map(|n| n.info.printable_name()).collect();
    let mut order: Vec<usize> = (0..nodes.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .0
            .unsigned_abs()
            .cmp(&values[a].0.unsigned_abs())
            .then(values[b].1.unsigned_abs().cmp(&values[a].1.unsigned_abs()))
            .then_with(|| names[a].cmp(&names[b]))
    });

    let mut graph = Graph::new();
    let mut remap = vec![0; nodes.len()];
    for &old in &order {
        let id = graph.add_node(nodes[old].info.clone());
        let node = &mut graph.nodes[id];
        (node.flat, node.cum) = values[old];
        node.inlined = nodes[old].inlined;
        remap[old] = id;
    }
    for e in &edges {
        graph.add_edge(
            remap[e.src],
            remap[e.dest],
            mean_value(e.weight, e.div, mean),
            e.inline,
        );
    }
    graph
}

fn is_negative(node: &Node) -> bool {
    node.flat < 0 || (node.flat == 0 && node.cum < 0)
}

/// Apply `drop_negative` and, with `trim`, the node/edge cutoffs and node
/// count. Returns the trimmed graph and its legend lines.
pub(crate) fn trim_graph(
    mut graph: Graph,
    cfg: &EffectiveConfig,
    command: &Command,
    total: i64,
    format: &ValueFormat,
) -> (Graph, Vec<String>) {
    if cfg.drop_negative {
        let keep: Vec<NodeId> = graph
            .nodes
            .iter()
            .filter(|n| !is_negative(n))
            .map(|n| n.id)
            .collect();
        if keep.len() != graph.nodes.len() {
            graph = graph.select(&keep, |_| true);
        }
    }

    let mut legend = Vec::new();
    if !cfg.trim {
        legend.push(showing(&graph, total, format));
        return (graph, legend);
    }

    let node_cutoff = (total as f64 * cfg.node_fraction).abs() as i64;
    let edge_cutoff = (total as f64 * cfg.edge_fraction).abs() as i64;

    let mut keep: Vec<NodeId> = graph
        .nodes
        .iter()
        .filter(|n| n.cum.unsigned_abs() >= node_cutoff.unsigned_abs())
        .map(|n| n.id)
        .collect();
    let dropped_nodes = graph.nodes.len() - keep.len();

    let visible = keep.len();
    let node_count = cfg
        .node_count
        .or(command.is_graph().then_some(DEFAULT_GRAPH_NODE_COUNT))
        .filter(|&n| n > 0);
    if let Some(limit) = node_count.filter(|&n| keep.len() > n) {
        let mut by_cum = keep.clone();
        by_cum.sort_by_key(|&id| std::cmp::Reverse(graph.nodes[id].cum.unsigned_abs()));
        let top: HashSet<NodeId> = by_cum.into_iter().take(limit).collect();
        keep.retain(|id| top.contains(id));
    }

    let kept: HashSet<NodeId> = keep.iter().copied().collect();
    let mut dropped_edges = 0;
    let trimmed = graph.select(&keep, |e| {
        if !kept.contains(&e.dest) {
            return false;
        }
        let keep_edge = e.weight.unsigned_abs() >= edge_cutoff.unsigned_abs();
        if !keep_edge {
            dropped_edges += 1;
        }
        keep_edge
    });

    legend.push(showing(&trimmed, total, format));
    if dropped_nodes > 0 {
        legend.push(format!(
            "Dropped {} nodes (cum <= {})",
            dropped_nodes,
            format.format(node_cutoff)
        ));
    }
    if dropped_edges > 0 {
        legend.push(format!(
            "Dropped {} edges (freq <= {})",
            dropped_edges,
            format.format(edge_cutoff)
        ));
    }
    if keep.len() < visible {
        legend.push(format!(
            "Showing top {} nodes out of {}",
            keep.len(),
            visible
        ));
    }
    (trimmed, legend)
}

fn showing(graph: &Graph, total: i64, format: &ValueFormat) -> String {
    let flat = graph.total_flat();
    format!(
        "Showing nodes accounting for {}, {} of {} total",
        format.format(flat),
        percentage(flat, total).trim(),
        format.format(total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_shared::Stack;

    fn select(stacks: &[Stack], value: i64) -> Vec<Selected<'_>> {
        stacks
            .iter()
            .map(|s| Selected {
                frames: s.frames.iter().collect(),
                value,
                div: 1,
            })
            .collect()
    }

    fn name(g: &Graph, id: NodeId) -> &str {
        &g.nodes[id].info.name
    }

    #[test]
    fn test_merged_graph() {
        let stacks = vec![
            Stack::from_call_path(&["A", "B"]),
            Stack::from_call_path(&["A", "C"]),
            Stack::from_call_path(&["A", "B"]),
        ];
        let g = build_graph(&select(&stacks, 1), Granularity::Functions, false, false);
        let order: Vec<(&str, i64, i64)> = g
            .nodes
            .iter()
            .map(|n| (n.info.name.as_str(), n.flat, n.cum))
            .collect();
        assert_eq!(order, vec![("B", 2, 2), ("C", 1, 1), ("A", 0, 3)]);
        let a = &g.nodes[2];
        let callees: Vec<(&str, i64)> = a
            .out_edges
            .iter()
            .map(|e| (name(&g, e.dest), e.weight))
            .collect();
        assert_eq!(callees, vec![("B", 2), ("C", 1)]);
    }

    #[test]
    fn test_recursion_counts_once() {
        let stacks = vec![Stack::from_call_path(&["main", "walk", "walk", "walk"])];
        let g = build_graph(&select(&stacks, 4), Granularity::Functions, false, false);
        assert_eq!(g.nodes.len(), 2);
        let walk = g.nodes.iter().find(|n| n.info.name == "walk").unwrap();
        assert_eq!(walk.cum, 4);
        assert_eq!(walk.flat, 4);
        assert!(walk.out_edges.is_empty());
    }

    #[test]
    fn test_call_tree_splits_paths() {
        let stacks = vec![
            Stack::from_call_path(&["main", "a", "leaf"]),
            Stack::from_call_path(&["main", "b", "leaf"]),
        ];
        let merged = build_graph(&select(&stacks, 1), Granularity::Functions, false, false);
        assert_eq!(merged.nodes.len(), 4);
        let tree = build_graph(&select(&stacks, 1), Granularity::Functions, true, false);
        assert_eq!(tree.nodes.len(), 5);
        assert!(tree.nodes.iter().all(|n| n.in_edges.len() <= 1));
    }

    #[test]
    fn test_mean_divides_by_count() {
        let stacks = vec![Stack::from_call_path(&["lock"])];
        let samples = vec![Selected {
            frames: stacks[0].frames.iter().collect(),
            value: 300,
            div: 3,
        }];
        let g = build_graph(&samples, Granularity::Functions, false, true);
        assert_eq!(g.nodes[0].flat, 100);
    }

    #[test]
    fn test_trim_drops_small_nodes() {
        let mut stacks = vec![Stack::from_call_path(&["main", "hot"]); 99];
        stacks.push(Stack::from_call_path(&["main", "cold"]));
        let g = build_graph(&select(&stacks, 1), Granularity::Functions, false, false);
        let cfg = EffectiveConfig {
            node_fraction: 0.05,
            ..Default::default()
        };
        let format = ValueFormat {
            unit: "count".into(),
            mean: false,
        };
        let (trimmed, legend) = trim_graph(g, &cfg, &Command::Svg, 100, &format);
        let names: Vec<&str> = trimmed.nodes.iter().map(|n| n.info.name.as_str()).collect();
        assert_eq!(names, vec!["hot", "main"]);
        assert_eq!(legend[0], "Showing nodes accounting for 99, 99.00% of 100 total");
        assert_eq!(legend[1], "Dropped 1 nodes (cum <= 5)");
    }

    #[test]
    fn test_node_count_keeps_heaviest() {
        let stacks = vec![
            Stack::from_call_path(&["main", "a"]),
            Stack::from_call_path(&["main", "b"]),
            Stack::from_call_path(&["main", "b"]),
        ];
        let g = build_graph(&select(&stacks, 1), Granularity::Functions, false, false);
        let cfg = EffectiveConfig {
            node_count: Some(2),
            ..Default::default()
        };
        let format = ValueFormat {
            unit: "count".into(),
            mean: false,
        };
        let (trimmed, legend) = trim_graph(g, &cfg, &Command::Top, 3, &format);
        let names: Vec<&str> = trimmed.nodes.iter().map(|n| n.info.name.as_str()).collect();
        assert_eq!(names, vec!["b", "main"]);
        assert!(legend.contains(&"Showing top 2 nodes out of 3".to_string()));
    }

    #[test]
    fn test_drop_negative() {
        let stacks = vec![
            Stack::from_call_path(&["main", "grew"]),
            Stack::from_call_path(&["main", "shrank"]),
        ];
        let mut samples = select(&stacks, 5);
        samples[1].value = -2;
        let g = build_graph(&samples, Granularity::Functions, false, false);
        let cfg = EffectiveConfig {
            drop_negative: true,
            trim: false,
            ..Default::default()
        };
        let format = ValueFormat {
            unit: "count".into(),
            mean: false,
        };
        let (trimmed, _) = trim_graph(g, &cfg, &Command::Top, 7, &format);
        assert!(trimmed.nodes.iter().all(|n| n.info.name != "shrank"));
    }

    #[test]
    fn test_granularity_keys() {
        let frame = Frame {
            address: 0x1000,
            function: Some("run".into()),
            file: Some("src/run.rs".into()),
            line: Some(7),
            module: Some("/bin/app".into()),
            inlined: false,
        };
        assert_eq!(node_info(&frame, Granularity::Functions).printable_name(), "run");
        assert_eq!(
            node_info(&frame, Granularity::Lines).printable_name(),
            "run src/run.rs:7"
        );
        assert_eq!(node_info(&frame, Granularity::Files).printable_name(), "src/run.rs");
        assert_eq!(
            node_info(&frame, Granularity::Addresses).printable_name(),
            "0000000000001000 run src/run.rs:7"
        );
        let unresolved = Frame::new_unresolved(0x2000);
        assert_eq!(
            node_info(&unresolved, Granularity::Functions).printable_name(),
            "0000000000002000 <unknown>"
        );
    }
}
