use std::{
    fmt::Display,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use anyhow::Context;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    constants::Weight,
    graph::{DefaultIdx, Edge, EdgeIndex, Graph, NodeIndex},
};

/// A traversable arc of the hierarchy, seen from the expanding node:
/// `node` is the other endpoint, `edge` the arc it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub edge: EdgeIndex,
    pub node: NodeIndex,
    pub weight: Weight,
}

/// The shape of a contracted graph the bidirectional query runs on. Both
/// link iterators only ever yield arcs towards higher-level endpoints, so
/// every search naturally climbs the hierarchy. Implemented by the
/// in-memory [`OverlayGraph`] and the memory-mapped
/// [`MappedGraph`](crate::graph_file::MappedGraph).
pub trait HierarchyGraph {
    fn num_nodes(&self) -> usize;

    /// Arcs traversable away from `node` (upwards).
    fn links_fwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_;

    /// Arcs traversable towards `node` from higher-level endpoints.
    fn links_bwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_;

    fn edge_weight(&self, edge_idx: EdgeIndex) -> Weight;

    fn edge_endpoints(&self, edge_idx: EdgeIndex) -> (NodeIndex, NodeIndex);

    /// Recursively replaces shortcut arcs by their two halves, appending
    /// only original arcs to `out`.
    fn expand_edge(&self, edge_idx: EdgeIndex, out: &mut Vec<EdgeIndex>);
}

/// Representation of the graph after running
///     - NodeContractor::run
///     - NodeContractor::run_with_order
/// Shortest path calculation is performed on this graph.
#[derive(Serialize, Deserialize)]
#[serde(bound(deserialize = "Idx: serde::Deserialize<'de> + Default"))]
pub struct OverlayGraph<Idx = DefaultIdx> {
    // Represents the upward graph G↑
    pub edges_fwd: Vec<Vec<EdgeIndex<Idx>>>,
    // Represents the downward graph G↓
    pub edges_bwd: Vec<Vec<EdgeIndex<Idx>>>,

    g: Graph<Idx>,
    shortcuts: FxHashMap<EdgeIndex, [EdgeIndex; 2]>,
    pub node_ranks: Vec<usize>,
}

impl OverlayGraph {
    pub(crate) fn new(
        edges_fwd: Vec<Vec<EdgeIndex>>,
        edges_bwd: Vec<Vec<EdgeIndex>>,
        graph: Graph,
        shortcuts: FxHashMap<EdgeIndex, [EdgeIndex; 2]>,
        node_ranks: Vec<usize>,
    ) -> Self {
        OverlayGraph {
            edges_fwd,
            edges_bwd,
            g: graph,
            shortcuts,
            node_ranks,
        }
    }

    /// Returns the underlying road graph.
    pub fn road_graph(&self) -> &Graph {
        &self.g
    }

    pub fn edge(&self, edge_idx: EdgeIndex) -> &Edge<DefaultIdx> {
        &self.g.edges[edge_idx.index()]
    }

    pub fn edges_fwd(&self, node: NodeIndex) -> impl Iterator<Item = (EdgeIndex, &Edge)> {
        self.edges_fwd[node.index()]
            .iter()
            .map(|edge_idx| (*edge_idx, &self.g.edges[edge_idx.index()]))
    }

    pub fn edges_bwd(&self, node: NodeIndex) -> impl Iterator<Item = (EdgeIndex, &Edge)> {
        self.edges_bwd[node.index()]
            .iter()
            .map(|edge_idx| (*edge_idx, &self.g.edges[edge_idx.index()]))
    }

    /// Recursively unpacks shortcut edges. Used to reconstruct the original
    /// path after the shortest path calculation.
    pub fn unpack_edge(&self, edge_idx: EdgeIndex) -> Vec<EdgeIndex> {
        let mut unpacked = Vec::new();
        self.expand_edge(edge_idx, &mut unpacked);
        unpacked
    }

    fn other_endpoint(&self, edge_idx: EdgeIndex, node: NodeIndex) -> NodeIndex {
        let edge = &self.g.edges[edge_idx.index()];
        if edge.source == node {
            edge.target
        } else {
            edge.source
        }
    }

    /// Writes a snapshot of the contracted graph to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create overlay file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .context("Failed to encode overlay graph")?;
        Ok(())
    }

    /// Reads a snapshot written by [`save`](Self::save).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open overlay file {:?}", path))?;
        let mut reader = BufReader::new(file);
        let overlay =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .context("Failed to decode overlay graph")?;
        Ok(overlay)
    }

    pub fn print_info(&self) {
        println!(
            "SearchGraph:\t#Nodes: {}, #Edges: {}",
            self.edges_fwd.len(),
            self.edges_fwd.iter().flatten().count()
        );
    }
}

impl HierarchyGraph for OverlayGraph {
    fn num_nodes(&self) -> usize {
        self.edges_fwd.len()
    }

    fn links_fwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_ {
        self.edges_fwd[node.index()].iter().map(move |edge_idx| {
            let edge = &self.g.edges[edge_idx.index()];
            Link {
                edge: *edge_idx,
                node: self.other_endpoint(*edge_idx, node),
                weight: edge.weight,
            }
        })
    }

    fn links_bwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_ {
        self.edges_bwd[node.index()].iter().map(move |edge_idx| {
            let edge = &self.g.edges[edge_idx.index()];
            Link {
                edge: *edge_idx,
                node: self.other_endpoint(*edge_idx, node),
                weight: edge.weight,
            }
        })
    }

    fn edge_weight(&self, edge_idx: EdgeIndex) -> Weight {
        self.g.edges[edge_idx.index()].weight
    }

    fn edge_endpoints(&self, edge_idx: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let edge = &self.g.edges[edge_idx.index()];
        (edge.source, edge.target)
    }

    fn expand_edge(&self, edge_idx: EdgeIndex, out: &mut Vec<EdgeIndex>) {
        match self.shortcuts.get(&edge_idx) {
            Some([first, second]) => {
                self.expand_edge(*first, out);
                self.expand_edge(*second, out);
            }
            None => out.push(edge_idx),
        }
    }
}

impl Display for OverlayGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "SearchGraph: #Edges: {}, #Nodes: {}",
            self.edges_fwd.iter().flatten().count(),
            self.edges_fwd.len()
        )?;
        for (node, edges) in self.edges_fwd.iter().enumerate() {
            write!(f, "  {}:", node)?;
            for edge_idx in edges {
                write!(
                    f,
                    " {}->{} ",
                    self.g.edges[edge_idx.index()].source.index(),
                    self.g.edges[edge_idx.index()].target.index()
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f)
    }
}
