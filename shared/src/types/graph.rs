//! Weighted call graph
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Adjacency is kept
//! in insertion order so everything derived from a graph (diagram numbering,
//! flame-graph child order) is deterministic.

use std::collections::HashMap;

/// Index of a node in [`Graph::nodes`]
pub type NodeId = usize;

/// Identity of a graph node.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct NodeInfo {
    /// Function name, empty when the node is keyed by file or address only
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub address: Option<u64>,
    /// Object file, used when nothing else identifies the node
    pub objfile: Option<String>,
}

impl NodeInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Components of the printable name: address, function, location.
    pub fn name_components(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(address) = self.address.filter(|&a| a != 0) {
            parts.push(format!("{:016x}", address));
        }
        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        match (&self.file, self.line) {
            (Some(file), Some(line)) if line != 0 => parts.push(format!("{}:{}", file, line)),
            (Some(file), _) if !file.is_empty() => parts.push(file.clone()),
            _ if !self.name.is_empty() => {}
            _ => match &self.objfile {
                Some(obj) => {
                    let base = obj.rsplit('/').next().unwrap_or(obj);
                    parts.push(format!("[{}]", base));
                }
                None => parts.push("<unknown>".to_string()),
            },
        }
        parts
    }

    /// Full human-readable name of the node
    pub fn printable_name(&self) -> String {
        self.name_components().join(" ")
    }
}

/// A weighted edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub src: NodeId,
    pub dest: NodeId,
    pub weight: i64,
    /// Callee was inlined into the caller
    pub inline: bool,
}

/// Edges of one node, keyed by the node at the other end, in insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeMap {
    edges: Vec<Edge>,
    index: HashMap<NodeId, usize>,
}

impl EdgeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edge to or from `other`
    pub fn get(&self, other: NodeId) -> Option<&Edge> {
        self.index.get(&other).map(|&i| &self.edges[i])
    }

    fn upsert(&mut self, other: NodeId, edge: Edge) {
        match self.index.get(&other) {
            Some(&i) => {
                let existing = &mut self.edges[i];
                existing.weight = existing.weight.saturating_add(edge.weight);
                existing.inline &= edge.inline;
            }
            None => {
                self.index.insert(other, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    /// Edges in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A node of the call graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub info: NodeInfo,
    /// Value attributed to the node itself
    pub flat: i64,
    /// Value of the node and everything it calls
    pub cum: i64,
    /// All frames merged into this node were inlined
    pub inlined: bool,
    /// Callers
    pub in_edges: EdgeMap,
    /// Callees
    pub out_edges: EdgeMap,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.in_edges.is_empty()
    }
}

/// Weighted call graph built by an aggregation engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node with zero weight and return its id
    pub fn add_node(&mut self, info: NodeInfo) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            info,
            flat: 0,
            cum: 0,
            inlined: false,
            in_edges: EdgeMap::new(),
            out_edges: EdgeMap::new(),
        });
        id
    }

    /// Add `weight` to the edge `src -> dest`, creating it if needed.
    /// Unknown ids are ignored.
    pub fn add_edge(&mut self, src: NodeId, dest: NodeId, weight: i64, inline: bool) {
        if src >= self.nodes.len() || dest >= self.nodes.len() {
            return;
        }
        let edge = Edge {
            src,
            dest,
            weight,
            inline,
        };
        self.nodes[src].out_edges.upsert(dest, edge.clone());
        self.nodes[dest].in_edges.upsert(src, edge);
    }

    /// Sum of flat values over all nodes
    pub fn total_flat(&self) -> i64 {
        self.nodes
            .iter()
            .fold(0i64, |acc, n| acc.saturating_add(n.flat))
    }

    /// Build a new graph containing only `keep`, in that order.
    ///
    /// Ids are reassigned; edges between kept nodes are preserved in their
    /// original insertion order. Edges are filtered by `keep_edge`.
    pub fn select<F>(&self, keep: &[NodeId], mut keep_edge: F) -> Graph
    where
        F: FnMut(&Edge) -> bool,
    {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(keep.len());
        let mut order = Vec::with_capacity(keep.len());
        let mut out = Graph::new();
        for &old in keep {
            let Some(node) = self.nodes.get(old) else {
                continue;
            };
            if remap.contains_key(&old) {
                continue;
            }
            order.push(node);
            let id = out.add_node(node.info.clone());
            let new = &mut out.nodes[id];
            new.flat = node.flat;
            new.cum = node.cum;
            new.inlined = node.inlined;
            remap.insert(old, id);
        }
        for node in order {
            for edge in node.out_edges.iter() {
                if !keep_edge(edge) {
                    continue;
                }
                if let (Some(&src), Some(&dest)) = (remap.get(&edge.src), remap.get(&edge.dest)) {
                    out.add_edge(src, dest, edge.weight, edge.inline);
                }
            }
        }
        out
    }
}
