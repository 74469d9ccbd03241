use crate::constants::{TagId, Weight};
use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    hash::Hash,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Default integer type for node and edge indices.
/// Needs to be increased for very large graphs > u32::max
pub type DefaultIdx = u32;

pub trait IndexType: Copy + Default + Hash + Ord + fmt::Debug {
    fn new(idx: usize) -> Self;
    fn index(&self) -> usize;
    fn max() -> Self;
}

impl IndexType for usize {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x
    }
    #[inline(always)]
    fn index(&self) -> Self {
        *self
    }
    #[inline(always)]
    fn max() -> Self {
        usize::MAX
    }
}

impl IndexType for u32 {
    #[inline(always)]
    fn new(x: usize) -> Self {
        x as u32
    }
    #[inline(always)]
    fn index(&self) -> usize {
        *self as usize
    }
    #[inline(always)]
    fn max() -> Self {
        u32::MAX
    }
}

/// Node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct NodeIndex<Idx = DefaultIdx>(Idx);

impl NodeIndex {
    #[inline]
    pub fn new(x: usize) -> Self {
        NodeIndex(IndexType::new(x))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0.index()
    }

    #[inline]
    pub fn end() -> Self {
        NodeIndex(IndexType::max())
    }
}

impl<Idx: IndexType> From<Idx> for NodeIndex<Idx> {
    fn from(ix: Idx) -> Self {
        NodeIndex(ix)
    }
}

/// Short version of `NodeIndex::new`
pub fn node_index(index: usize) -> NodeIndex {
    NodeIndex::new(index)
}

/// Edge identifier.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, PartialOrd, Eq, Ord, Hash, Deserialize, Serialize,
)]
pub struct EdgeIndex<Idx = DefaultIdx>(Idx);

impl<Idx: IndexType> From<Idx> for EdgeIndex<Idx> {
    fn from(ix: Idx) -> Self {
        EdgeIndex(ix)
    }
}

impl<Idx: IndexType> EdgeIndex<Idx> {
    #[inline]
    pub fn new(x: usize) -> Self {
        EdgeIndex(IndexType::new(x))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0.index()
    }

    /// An invalid `EdgeIndex` used to denote absence of an edge, for example
    /// to end an adjacency list.
    #[inline]
    pub fn end() -> Self {
        EdgeIndex(IndexType::max())
    }
}

/// A vertex of the road network with its position.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub id: usize,
    pub lat: f64,
    pub lon: f64,
}

impl Node {
    pub fn new(id: usize, lat: f64, lon: f64) -> Self {
        Node { id, lat, lon }
    }
}

/// An arc of the graph. `forward` marks the edge as traversable from
/// `source` to `target`, `backward` in the opposite direction. Arcs created
/// during contraction carry the contracted vertex in `via`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(bound(deserialize = "Idx: serde::Deserialize<'de> + Default"))]
pub struct Edge<Idx = DefaultIdx> {
    pub source: NodeIndex<Idx>,
    pub target: NodeIndex<Idx>,
    pub weight: Weight,
    pub forward: bool,
    pub backward: bool,
    #[serde(default)]
    pub via: Option<NodeIndex<Idx>>,
    #[serde(default)]
    pub tag: Option<TagId>,
}

impl Edge {
    pub fn new(
        source: NodeIndex<DefaultIdx>,
        target: NodeIndex<DefaultIdx>,
        weight: Weight,
    ) -> Self {
        Edge {
            source,
            target,
            weight,
            forward: true,
            backward: false,
            via: None,
            tag: None,
        }
    }

    pub fn new_bidir(
        source: NodeIndex<DefaultIdx>,
        target: NodeIndex<DefaultIdx>,
        weight: Weight,
    ) -> Self {
        Edge {
            source,
            target,
            weight,
            forward: true,
            backward: true,
            via: None,
            tag: None,
        }
    }

    pub(crate) fn shortcut(
        source: NodeIndex<DefaultIdx>,
        target: NodeIndex<DefaultIdx>,
        weight: Weight,
        via: NodeIndex<DefaultIdx>,
    ) -> Self {
        Edge {
            source,
            target,
            weight,
            forward: true,
            backward: false,
            via: Some(via),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: TagId) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn is_shortcut(&self) -> bool {
        self.via.is_some()
    }

    /// The same arc seen from the other endpoint. Traversal flags swap
    /// along with source and target.
    pub(crate) fn reverse(&self) -> Self {
        Edge {
            source: self.target,
            target: self.source,
            weight: self.weight,
            forward: self.backward,
            backward: self.forward,
            via: self.via,
            tag: self.tag,
        }
    }
}

/// Two arcs overlap if they share directionality semantics. Overlapping
/// duplicates are merged by `add_edge`, keeping the lower weight.
fn same_direction(a: &Edge, b: &Edge) -> bool {
    a.forward == b.forward && a.backward == b.backward
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "Idx: serde::Deserialize<'de> + Default"))]
pub struct Graph<Idx = DefaultIdx> {
    pub edges_in: Vec<Vec<EdgeIndex<Idx>>>,
    pub edges_out: Vec<Vec<EdgeIndex<Idx>>>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge<Idx>>,
    pub num_shortcuts: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            edges_in: Vec::new(),
            edges_out: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            num_shortcuts: 0,
        }
    }

    pub fn with_capacity(num_nodes: usize, num_edges: usize) -> Self {
        Self {
            edges_in: Vec::with_capacity(num_nodes),
            edges_out: Vec::with_capacity(num_nodes),
            nodes: Vec::with_capacity(num_nodes),
            edges: Vec::with_capacity(num_edges),
            num_shortcuts: 0,
        }
    }

    /// Adds a new vertex at the given position and returns its dense index.
    pub fn add_vertex(&mut self, lat: f64, lon: f64) -> NodeIndex {
        let id = self.nodes.len();
        self.add_node(Node::new(id, lat, lon))
    }

    /// Adds a new node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let node_idx: NodeIndex = NodeIndex::new(self.nodes.len());

        assert!(
            NodeIndex::end() != node_idx,
            "Maximum number of nodes for index type {} exceeded",
            std::any::type_name::<DefaultIdx>()
        );

        // Create new entry in adjacency list for new node
        self.edges_in.push(Vec::new());
        self.edges_out.push(Vec::new());

        self.nodes.push(node);

        node_idx
    }

    /// Adds an arc between two existing vertices.
    pub fn add_arc(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        weight: Weight,
        forward: bool,
        backward: bool,
        tag: Option<TagId>,
    ) -> EdgeIndex {
        self.add_edge(Edge {
            source: from,
            target: to,
            weight,
            forward,
            backward,
            via: None,
            tag,
        })
    }

    /// Add a new `edge` to the graph, deduplicating against existing arcs
    /// with the default overlap rule (`same_direction`).
    ///
    /// **Panics** if the graph is at the maximum number of edges for its
    /// index type, if the source or target node does not exist, on
    /// self-loops and on negative weights.
    ///
    /// Returns the index of the edge that now represents the arc. If an
    /// overlapping arc with lower weight already exists its index is
    /// returned unchanged; if the new edge wins, the old record is
    /// overwritten in place.
    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        self.add_edge_with(edge, same_direction)
    }

    /// Like [`add_edge`](Self::add_edge) but with a caller-provided overlap
    /// judgment for the deduplication step.
    pub fn add_edge_with<F>(&mut self, edge: Edge, overlaps: F) -> EdgeIndex
    where
        F: Fn(&Edge, &Edge) -> bool,
    {
        let edge_idx = EdgeIndex::new(self.edges.len());

        assert!(
            EdgeIndex::end() != edge_idx,
            "Maximum number of edges for index type {} exceeded",
            std::any::type_name::<DefaultIdx>()
        );
        assert!(
            edge.source.index() < self.nodes.len(),
            "Source node index ({}) does not exist",
            edge.source.index()
        );
        assert!(
            edge.target.index() < self.nodes.len(),
            "Target node index ({}) does not exist",
            edge.target.index()
        );
        assert!(
            edge.source != edge.target,
            "Self-loop on node {} rejected",
            edge.source.index()
        );
        assert!(
            edge.weight >= 0.0,
            "Negative weight {} on arc {} -> {} rejected",
            edge.weight,
            edge.source.index(),
            edge.target.index()
        );

        // At most one arc per (source, target, direction): if an
        // overlapping arc already exists, the lower weight wins and the
        // losing payload is dropped.
        for old_idx in self.edges_out[edge.source.index()].iter() {
            let old_edge = &self.edges[old_idx.index()];
            if old_edge.source == edge.source
                && old_edge.target == edge.target
                && overlaps(&edge, old_edge)
            {
                if edge.weight < old_edge.weight {
                    self.edges[old_idx.index()] = edge;
                }
                return *old_idx;
            }
        }

        if edge.forward {
            self.edges_out[edge.source.index()].push(edge_idx);
            self.edges_in[edge.target.index()].push(edge_idx);
        }

        if edge.backward {
            self.edges_out[edge.target.index()].push(edge_idx);
            self.edges_in[edge.source.index()].push(edge_idx);
        }

        self.edges.push(edge);

        edge_idx
    }

    pub fn add_edges(&mut self, edges: Vec<Edge>) {
        for edge in edges {
            self.add_edge(edge);
        }
    }

    /// Removes every adjacency reference between `from` and `to`. The edge
    /// records themselves stay in the arena as unreachable tombstones.
    pub fn delete_arc(&mut self, from: NodeIndex, to: NodeIndex) {
        assert!(
            from.index() < self.nodes.len() && to.index() < self.nodes.len(),
            "delete_arc on nonexistent node"
        );

        let connects = |edge: &Edge| {
            (edge.source == from && edge.target == to)
                || (edge.source == to && edge.target == from)
        };

        for node in [from, to] {
            let edges = &self.edges;
            self.edges_out[node.index()].retain(|idx| !connects(&edges[idx.index()]));
            self.edges_in[node.index()].retain(|idx| !connects(&edges[idx.index()]));
        }
        debug!("Deleted arcs between {} and {}", from.index(), to.index());
    }

    /// True if any arc leads from `node` to `other`.
    pub fn has_neighbour(&self, node: NodeIndex, other: NodeIndex) -> bool {
        self.neighbors_outgoing(node).any(|(_, e)| e.target == other)
    }

    /// All arcs leaving `node`, oriented away from it.
    pub fn get_arcs(&self, node: NodeIndex) -> Vec<(NodeIndex, Edge)> {
        self.neighbors_outgoing(node)
            .map(|(_, e)| (e.target, e))
            .collect()
    }

    pub fn node(&self, node_idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(node_idx.index())
    }

    /// Returns an iterator over all nodes of the graph
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Returns an iterator over all edges of the graph
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn neighbors_outgoing(
        &self,
        node_idx: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, Edge)> + '_ {
        self.edges_out[node_idx.index()].iter().map(move |edge_idx| {
            let edge = &self.edges[edge_idx.index()];
            if edge.source == node_idx {
                (*edge_idx, edge.clone())
            } else {
                (*edge_idx, edge.reverse())
            }
        })
    }

    pub fn neighbors_incoming(
        &self,
        node_idx: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, Edge)> + '_ {
        self.edges_in[node_idx.index()].iter().map(move |edge_idx| {
            let edge = &self.edges[edge_idx.index()];
            if edge.target == node_idx {
                (*edge_idx, edge.clone())
            } else {
                (*edge_idx, edge.reverse())
            }
        })
    }

    pub fn print_info(&self) {
        println!(
            "InputGraph:\t#Nodes: {}, #Edges: {}, #Shortcuts: {}",
            self.nodes.len(),
            self.edges.len() - self.num_shortcuts,
            self.num_shortcuts
        );
    }

    /// Writes a snapshot of the graph to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create graph file {:?}", path))?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .context("Failed to encode graph")?;
        Ok(())
    }

    /// Reads a snapshot written by [`save`](Self::save).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open graph file {:?}", path))?;
        let mut reader = BufReader::new(file);
        let graph =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .context("Failed to decode graph")?;
        Ok(graph)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro to create an edge between source and target with a weight
///
/// edge!(0, 1, 3.0) returns an edge traversable in both directions
///
/// edge!(0 => 1, 3.0) returns a directed edge
#[macro_export]
macro_rules! edge {
    ($source:expr => $target:expr, $weight:expr) => {
        $crate::graph::Edge::new($source.into(), $target.into(), $weight)
    };
    ($source:expr , $target:expr, $weight:expr) => {
        $crate::graph::Edge::new_bidir($source.into(), $target.into(), $weight)
    };
}

/// Macro to create a node with a given id, lat, lon
/// node!(0, 1.0, 1.0)
#[macro_export]
macro_rules! node {
    ($id:expr, $lat:expr, $lon:expr) => {
        $crate::graph::Node::new($id, $lat, $lon)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_round_trip() {
        let mut g = Graph::new();
        let a = g.add_vertex(48.137, 11.575);
        let b = g.add_vertex(-33.868, 151.209);

        assert_eq!(g.node(a).unwrap().lat, 48.137);
        assert_eq!(g.node(a).unwrap().lon, 11.575);
        assert_eq!(g.node(b).unwrap().lat, -33.868);
        assert_eq!(g.node(b).unwrap().lon, 151.209);
        assert!(g.node(NodeIndex::new(2)).is_none());
    }

    #[test]
    fn add_duplicate_edges() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);

        let edge1 = g.add_edge(edge!(a => b, 2.0));
        let _edge2 = g.add_edge(edge!(a => b, 1.0));

        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[edge1.index()].weight, 1.0);
    }

    #[test]
    fn duplicate_keeps_minimum_either_order() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);

        let edge1 = g.add_edge(edge!(a => b, 1.0));
        let _edge2 = g.add_edge(edge!(a => b, 2.0));

        assert_eq!(g.edges.len(), 1);
        assert_eq!(g.edges[edge1.index()].weight, 1.0);
    }

    #[test]
    fn directed_and_bidir_arcs_coexist() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(a => b, 2.0));
        g.add_edge(edge!(a, b, 5.0));

        // Different directionality semantics, no merge
        assert_eq!(g.edges.len(), 2);
        assert_eq!(g.neighbors_outgoing(a).count(), 2);
        assert_eq!(g.neighbors_outgoing(b).count(), 1);
    }

    #[test]
    fn bidir_edge_reverses_on_iteration() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(a, b, 3.0));

        let (_, from_b) = g.neighbors_outgoing(b).next().unwrap();
        assert_eq!(from_b.source, b);
        assert_eq!(from_b.target, a);
        assert_eq!(from_b.weight, 3.0);
    }

    #[test]
    #[should_panic(expected = "Self-loop")]
    fn self_loop_rejected() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        g.add_edge(edge!(a => a, 1.0));
    }

    #[test]
    #[should_panic(expected = "Negative weight")]
    fn negative_weight_rejected() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        g.add_edge(edge!(a => b, -1.0));
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn out_of_range_target_rejected() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        g.add_edge(edge!(a => NodeIndex::new(7), 1.0));
    }

    #[test]
    fn delete_arc_and_has_neighbour() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        let c = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(a, b, 1.0));
        g.add_edge(edge!(b => c, 2.0));

        assert!(g.has_neighbour(a, b));
        assert!(g.has_neighbour(b, a));
        assert!(g.has_neighbour(b, c));
        assert!(!g.has_neighbour(c, b));

        g.delete_arc(a, b);

        assert!(!g.has_neighbour(a, b));
        assert!(!g.has_neighbour(b, a));
        assert!(g.has_neighbour(b, c));
        assert_eq!(g.get_arcs(b).len(), 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut g = Graph::new();
        let a = g.add_vertex(1.0, 2.0);
        let b = g.add_vertex(3.0, 4.0);
        g.add_edge(edge!(a, b, 7.5));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        g.save(&path).unwrap();

        let loaded = Graph::load(&path).unwrap();
        assert_eq!(loaded.nodes.len(), 2);
        assert_eq!(loaded.edges.len(), 1);
        assert_eq!(loaded.edges[0].weight, 7.5);
        assert!(loaded.edges[0].forward && loaded.edges[0].backward);
    }
}
