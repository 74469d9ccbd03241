//! Module to build contraction hierarchies from a given [`Graph`].
//!
//! # Examples
//! ```no_run
//! use ch_router::graph::Graph;
//! use ch_router::node_contraction::NodeContractor;
//!
//! let mut g = Graph::new();
//! // ... fill the graph via add_vertex / add_arc ...
//!
//! let mut contractor = NodeContractor::new(&mut g);
//! let overlay_graph = contractor.run();
//! ```
//!
//! [`Graph`]: crate::graph::Graph
use std::{
    cmp::{max, Reverse},
    time::Instant,
};

use log::{debug, info};
use priority_queue::PriorityQueue;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    contraction_params::ContractionParams,
    contraction_strategy::ContractionStrategy,
    graph::{node_index, Edge, EdgeIndex, Graph, NodeIndex},
    overlay_graph::OverlayGraph,
    witness_search::WitnessSearch,
};

const STEP_SIZE: f64 = 5.0;

/// Hooks fired around every single vertex contraction, for external
/// verification harnesses. All methods default to no-ops.
pub trait ContractionObserver {
    fn on_before_contraction(
        &mut self,
        _g: &Graph,
        _node: NodeIndex,
        _neighbor_edges: &[(EdgeIndex, Edge)],
    ) {
    }

    fn on_after_contraction(
        &mut self,
        _g: &Graph,
        _node: NodeIndex,
        _neighbor_edges: &[(EdgeIndex, Edge)],
    ) {
    }
}

struct NoopObserver;

impl ContractionObserver for NoopObserver {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractionState {
    Uninitialized,
    Running,
    Done,
}

/// Builds the hierarchy by repeatedly contracting the minimum-priority
/// vertex. Holds the bookkeeping shared between contraction steps: ranks,
/// the contracted flags, the shortcut expansion map and the priority
/// parameters.
pub struct NodeContractor<'a> {
    g: &'a mut Graph,
    node_ranks: Vec<usize>,
    nodes_contracted: Vec<bool>,
    contracted_neighbors: Vec<usize>,
    num_nodes: usize,
    shortcuts: FxHashMap<EdgeIndex, [EdgeIndex; 2]>,
    params: ContractionParams,
    state: ContractionState,
}

impl<'a> NodeContractor<'a> {
    pub fn new(g: &'a mut Graph) -> Self {
        Self::new_with_params(g, Default::default())
    }

    pub fn new_with_params(g: &'a mut Graph, params: ContractionParams) -> Self {
        let num_nodes = g.nodes.len();
        let num_edges = g.edges.len();
        NodeContractor {
            g,
            node_ranks: vec![0; num_nodes],
            nodes_contracted: vec![false; num_nodes],
            contracted_neighbors: vec![0; num_nodes],
            num_nodes,
            shortcuts: FxHashMap::with_capacity_and_hasher(num_edges, Default::default()),
            params,
            state: ContractionState::Uninitialized,
        }
    }

    pub fn state(&self) -> ContractionState {
        self.state
    }

    pub fn run(&mut self) -> OverlayGraph {
        self.run_with_strategy(ContractionStrategy::default())
    }

    pub fn run_with_order(&mut self, node_order: &[NodeIndex]) -> OverlayGraph {
        self.run_with_strategy(ContractionStrategy::FixedOrder(node_order))
    }

    pub fn run_with_strategy(&mut self, strategy: ContractionStrategy) -> OverlayGraph {
        self.run_with_observer(strategy, &mut NoopObserver)
    }

    pub fn run_with_observer(
        &mut self,
        strategy: ContractionStrategy,
        observer: &mut dyn ContractionObserver,
    ) -> OverlayGraph {
        assert!(
            self.state == ContractionState::Uninitialized,
            "Contraction can only run once"
        );
        self.state = ContractionState::Running;

        let now = Instant::now();
        let mut edges_fwd: Vec<Vec<EdgeIndex>> = vec![Vec::new(); self.num_nodes];
        let mut edges_bwd: Vec<Vec<EdgeIndex>> = vec![Vec::new(); self.num_nodes];

        let mut levels = vec![0; self.num_nodes];
        // Allocate additional space for shortcuts to avoid reallocations
        self.g.edges.reserve(self.g.edges.len());

        let mut queue = match strategy {
            ContractionStrategy::FixedOrder(order) => {
                assert!(
                    order.len() == self.num_nodes,
                    "Fixed order must mention every node exactly once"
                );
                let mut pq = PriorityQueue::new();

                for (priority, node) in order.iter().enumerate() {
                    pq.push(*node, Reverse(priority as i32));
                }

                pq
            }
            ContractionStrategy::LazyUpdate(_) => self.calc_initial_node_order(),
        };

        let mut consecutive_lazy_updates = 0;
        let mut step_size = STEP_SIZE;
        let mut next_goal = step_size;

        while let Some((node, Reverse(priority))) = queue.pop() {
            if let ContractionStrategy::LazyUpdate(update) = strategy {
                // Re-check the popped priority. If it went stale, re-insert
                // instead of contracting.
                if update.update_jit() {
                    let importance = self.calc_priority(
                        node,
                        levels[node.index()],
                        self.params.witness_search_limit,
                    );

                    if importance > priority {
                        queue.push(node, Reverse(importance));
                        consecutive_lazy_updates += 1;

                        if update.periodic_update_triggered(consecutive_lazy_updates) {
                            debug!("Triggered periodic update of all priorities");
                            self.update_all_priorities(&mut queue, &levels);
                            consecutive_lazy_updates = 0;
                        }
                        continue;
                    }
                    consecutive_lazy_updates = 0;
                }
            }

            debug!("=> Contracting node: {}", node.index());

            let edges_in_v: Vec<(EdgeIndex, Edge)> = self.neighbors_incoming(node).collect();
            let edges_out_v: Vec<(EdgeIndex, Edge)> = self.neighbors_outgoing(node).collect();

            let neighbor_edges: Vec<(EdgeIndex, Edge)> = edges_in_v
                .iter()
                .chain(edges_out_v.iter())
                .cloned()
                .collect();

            observer.on_before_contraction(self.g, node, &neighbor_edges);

            let mut neighbors = FxHashSet::default();

            for (in_idx, in_edge) in &edges_in_v {
                neighbors.insert(in_edge.source);
                edges_bwd[node.index()].push(*in_idx);
            }

            for (out_idx, out_edge) in &edges_out_v {
                neighbors.insert(out_edge.target);
                edges_fwd[node.index()].push(*out_idx);
            }

            // Contract node
            self.contract_node(node, &edges_in_v, &edges_out_v);

            observer.on_after_contraction(self.g, node, &neighbor_edges);

            // Update only the priority of neighbors = Lazy Neighbor Updating
            for neighbor in neighbors {
                // Spatial uniformity heuristic
                self.contracted_neighbors[neighbor.index()] += 1;
                levels[neighbor.index()] = max(levels[node.index()] + 1, levels[neighbor.index()]);

                if let ContractionStrategy::LazyUpdate(update) = strategy {
                    if update.update_local() {
                        let importance = self.calc_priority(
                            neighbor,
                            levels[neighbor.index()],
                            self.params.witness_search_limit,
                        );

                        if let Some(Reverse(old_value)) =
                            queue.change_priority(&neighbor, Reverse(importance))
                        {
                            if importance != old_value {
                                debug!(
                                    "[Update] Changed priority of node {} from {} to {}",
                                    neighbor.index(),
                                    old_value,
                                    importance
                                );
                            }
                        }
                    }
                }
            }

            self.node_ranks[node.index()] = self.num_nodes - queue.len();

            let progress = (self.num_nodes - queue.len()) as f64 / self.num_nodes as f64;
            if progress * 100.0 >= next_goal {
                info!("Progress: {:.2}%", progress * 100.0);
                if progress * 100.0 >= 95.0 {
                    step_size = 0.5;
                }
                next_goal += step_size;
            }
        }

        self.state = ContractionState::Done;

        info!("Contracting nodes took {:?}", now.elapsed());
        info!("Added shortcuts: {}", self.g.num_shortcuts);

        self.g.edges.shrink_to_fit();
        self.shortcuts.shrink_to_fit();
        OverlayGraph::new(
            edges_fwd,
            edges_bwd,
            self.g.to_owned(),
            self.shortcuts.clone(),
            self.node_ranks.clone(),
        )
    }

    /// Iterator over all outgoing arcs of a node, oriented away from it,
    /// excluding arcs to already contracted nodes
    pub(crate) fn neighbors_outgoing(
        &self,
        node_idx: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, Edge)> + '_ {
        self.g.edges_out[node_idx.index()]
            .iter()
            .filter_map(move |edge_idx| {
                let edge = &self.g.edges[edge_idx.index()];
                let edge = if edge.source == node_idx {
                    edge.clone()
                } else {
                    edge.reverse()
                };
                (!self.nodes_contracted[edge.target.index()]).then_some((*edge_idx, edge))
            })
    }

    /// Iterator over all incoming arcs of a node, oriented towards it,
    /// excluding arcs from already contracted nodes
    pub(crate) fn neighbors_incoming(
        &self,
        node_idx: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, Edge)> + '_ {
        self.g.edges_in[node_idx.index()]
            .iter()
            .filter_map(move |edge_idx| {
                let edge = &self.g.edges[edge_idx.index()];
                let edge = if edge.target == node_idx {
                    edge.clone()
                } else {
                    edge.reverse()
                };
                (!self.nodes_contracted[edge.source.index()]).then_some((*edge_idx, edge))
            })
    }

    /// Finds every shortcut that contracting `v` requires: for each pair of
    /// incoming and outgoing arcs, the candidate `u -> w` survives only if
    /// the witness search finds no path of at most the same weight around
    /// `v`. Read-only; nothing is committed here.
    fn find_shortcuts(
        &self,
        v: NodeIndex,
        edges_in: &[(EdgeIndex, Edge)],
        edges_out: &[(EdgeIndex, Edge)],
        max_nodes_settled: usize,
    ) -> Vec<(Edge, [EdgeIndex; 2])> {
        let mut shortcuts = Vec::new();

        for (uv_idx, uv) in edges_in {
            let u = uv.source;

            let mut max_weight = 0.0;
            let mut target_nodes = Vec::new();
            // Calculate max_weight <u,v,w>
            for (_, vw) in edges_out {
                if u == vw.target {
                    continue;
                }

                let weight = uv.weight + vw.weight;
                if weight > max_weight {
                    max_weight = weight;
                }
                if !target_nodes.contains(&vw.target) {
                    target_nodes.push(vw.target);
                }
            }

            if target_nodes.is_empty() {
                continue;
            }

            // Start search from u
            let ws = WitnessSearch::with_params(self, max_nodes_settled, self.params.witness_hop_limit);
            let res = ws.search(u, &target_nodes, v, max_weight);

            // Add shortcut if no better path <u,...,w> was found
            for (vw_idx, vw) in edges_out {
                if u == vw.target {
                    continue;
                }

                let weight = uv.weight + vw.weight;
                let witness_weight = *res.get(&vw.target).unwrap_or(&f64::INFINITY);

                if witness_weight <= weight {
                    continue;
                }

                shortcuts.push((Edge::shortcut(u, vw.target, weight, v), [*uv_idx, *vw_idx]));
            }
        }

        shortcuts
    }

    /// Same result as [`find_shortcuts`](Self::find_shortcuts) with the
    /// per-in-arc witness searches fanned out over scoped threads. The join
    /// is the commit barrier required before any shortcut is inserted.
    fn find_shortcuts_par(
        &self,
        v: NodeIndex,
        edges_in: &[(EdgeIndex, Edge)],
        edges_out: &[(EdgeIndex, Edge)],
        max_nodes_settled: usize,
    ) -> Vec<(Edge, [EdgeIndex; 2])> {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(edges_in.len());
        let chunk_size = edges_in.len().div_ceil(threads);

        std::thread::scope(|s| {
            let handles: Vec<_> = edges_in
                .chunks(chunk_size)
                .map(|chunk| s.spawn(move || self.find_shortcuts(v, chunk, edges_out, max_nodes_settled)))
                .collect();

            let mut shortcuts = Vec::new();
            for handle in handles {
                shortcuts.extend(handle.join().expect("witness search thread panicked"));
            }
            shortcuts
        })
    }

    /// Commits the contraction of `v`: inserts the surviving shortcuts and
    /// disconnects `v`, atomically from the point of view of any reader of
    /// the finished overlay.
    fn contract_node(
        &mut self,
        v: NodeIndex,
        edges_in: &[(EdgeIndex, Edge)],
        edges_out: &[(EdgeIndex, Edge)],
    ) {
        let max_nodes_settled = self.params.witness_search_limit;

        let shortcuts = if self.params.parallel_witness && edges_in.len() > 1 {
            self.find_shortcuts_par(v, edges_in, edges_out, max_nodes_settled)
        } else {
            self.find_shortcuts(v, edges_in, edges_out, max_nodes_settled)
        };

        debug!("{v:?}: ({},{})", edges_in.len() + edges_out.len(), shortcuts.len());

        for (edge, replaces) in shortcuts {
            self.add_shortcut(edge, replaces);
        }

        self.disconnect_node(v);
    }

    fn add_shortcut(&mut self, edge: Edge, replaces: [EdgeIndex; 2]) {
        let via = edge.via;
        let len_before = self.g.edges.len();
        let edge_idx = self.g.add_edge(edge);

        if self.g.edges.len() > len_before {
            self.g.num_shortcuts += 1;
        }

        // The candidate may have lost the deduplication against an existing
        // cheaper arc, in which case the expansion map must not change.
        if self.g.edges[edge_idx.index()].via == via {
            self.shortcuts.insert(edge_idx, replaces);
        }
    }

    fn disconnect_node(&mut self, v: NodeIndex) {
        self.nodes_contracted[v.index()] = true;
    }

    /// True if a path `source -> ... -> target` avoiding `via` with weight
    /// at most `max_weight` exists in the uncontracted remainder of the
    /// graph, within the configured witness bounds. The bounds make this
    /// conservative: a missed witness only costs an extra shortcut.
    pub fn has_witness(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        via: NodeIndex,
        max_weight: crate::constants::Weight,
    ) -> bool {
        let ws = WitnessSearch::with_params(
            self,
            self.params.witness_search_limit,
            self.params.witness_hop_limit,
        );
        ws.has_witness(source, target, via, max_weight)
    }

    /// Simulates contracting `v` and returns (E, S), the number of removed
    /// edges and added shortcuts.
    fn simulate_contraction(&self, v: NodeIndex, max_nodes_settled: usize) -> (usize, usize) {
        let edges_in: Vec<(EdgeIndex, Edge)> = self.neighbors_incoming(v).collect();
        let edges_out: Vec<(EdgeIndex, Edge)> = self.neighbors_outgoing(v).collect();

        let removed_edges = edges_in.len() + edges_out.len();
        let added_shortcuts = self
            .find_shortcuts(v, &edges_in, &edges_out, max_nodes_settled)
            .len();

        (removed_edges, added_shortcuts)
    }

    fn calc_initial_node_order(&mut self) -> PriorityQueue<NodeIndex, Reverse<i32>> {
        let mut pq = PriorityQueue::new();

        let limit = self.params.witness_search_initial_limit;
        for v in 0..self.num_nodes {
            let v = node_index(v);
            let importance = self.calc_priority(v, 0, limit);
            pq.push(v, Reverse(importance));
        }

        pq
    }

    fn update_all_priorities(
        &mut self,
        queue: &mut PriorityQueue<NodeIndex, Reverse<i32>>,
        levels: &[usize],
    ) {
        let nodes: Vec<NodeIndex> = queue.iter().map(|(node, _)| *node).collect();
        for node in nodes {
            let importance =
                self.calc_priority(node, levels[node.index()], self.params.witness_search_limit);
            queue.change_priority(&node, Reverse(importance));
        }
    }

    /// Calculates the importance/relevance of a node v.
    /// The lower the value, the more important the node.
    /// Priority terms:
    /// - Edge difference: Shortcuts - Removed edges
    /// - Contracted neighbors: Spatial uniformity
    /// - Level: Depth of the node in the hierarchy
    fn calc_priority(&self, v: NodeIndex, level: usize, max_nodes_settled: usize) -> i32 {
        let params = self.params.priority_params;
        let edge_difference = self.calc_edge_difference(v, max_nodes_settled);
        let contracted_neighbors = self.contracted_neighbors[v.index()];

        edge_difference * params.edge_difference_coeff
            + level as i32 * params.search_space_coeff
            + contracted_neighbors as i32 * params.contracted_neighbors_coeff
    }

    /// ED = Shortcuts - Removed edges
    fn calc_edge_difference(&self, v: NodeIndex, max_nodes_settled: usize) -> i32 {
        let (removed_edges, added_shortcuts) = self.simulate_contraction(v, max_nodes_settled);
        added_shortcuts as i32 - removed_edges as i32
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::{
        constants::Weight,
        edge,
        search::dijkstra::Dijkstra,
        util::test_graphs::{generate_complex_graph, generate_line_graph, generate_simple_graph},
    };

    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn contract_simple_graph_with_order() {
        //           B
        //           |
        // E -> A -> C
        //      |  /
        //      D
        init_log();
        let mut g = generate_simple_graph();

        // A,E,D,C,B
        let node_order = vec![
            node_index(0),
            node_index(4),
            node_index(3),
            node_index(2),
            node_index(1),
        ];

        let mut contractor = NodeContractor::new(&mut g);

        contractor.run_with_order(&node_order);

        assert_eq!(2, contractor.g.num_shortcuts)
    }

    #[test]
    fn contract_line_graph_with_order() {
        // A - B - C - D - E with weights 1,2,3,4
        let mut g = generate_line_graph();

        // B,C,D,A,E
        let node_order = vec![
            node_index(1),
            node_index(2),
            node_index(3),
            node_index(0),
            node_index(4),
        ];

        let mut contractor = NodeContractor::new(&mut g);
        contractor.run_with_order(&node_order);

        // Each interior contraction bridges its two neighbors in both
        // directions.
        assert_eq!(6, contractor.g.num_shortcuts);
        assert_eq!(ContractionState::Done, contractor.state());
    }

    #[test]
    fn contract_complex_graph() {
        init_log();
        let mut g = generate_complex_graph();

        let mut contractor = NodeContractor::new(&mut g);
        contractor.run();

        assert_eq!(ContractionState::Done, contractor.state());
    }

    #[test]
    fn contract_complex_graph_parallel_witness() {
        init_log();
        let mut g = generate_complex_graph();
        let mut g2 = g.clone();

        let mut contractor = NodeContractor::new(&mut g);
        let order: Vec<NodeIndex> = (0..g2.nodes.len()).map(node_index).collect();
        contractor.run_with_order(&order);
        let sequential_shortcuts = contractor.g.num_shortcuts;

        let params = ContractionParams::new().parallel_witness(true);
        let mut contractor = NodeContractor::new_with_params(&mut g2, params);
        contractor.run_with_order(&order);

        assert_eq!(sequential_shortcuts, contractor.g.num_shortcuts);
    }

    #[test]
    #[should_panic(expected = "only run once")]
    fn contraction_runs_only_once() {
        let mut g = generate_simple_graph();
        let mut contractor = NodeContractor::new(&mut g);
        contractor.run();
        contractor.run();
    }

    #[test]
    fn disconnect_node() {
        let mut g = Graph::new();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        let c = g.add_vertex(0.0, 0.0);
        let u = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(a => u, 1.0));
        g.add_edge(edge!(u => c, 1.0));
        g.add_edge(edge!(c => b, 1.0));
        g.add_edge(edge!(u => b, 1.0));

        let mut contractor = NodeContractor::new(&mut g);
        contractor.disconnect_node(u);

        assert_eq!(contractor.neighbors_outgoing(a).count(), 0);
        assert_eq!(contractor.neighbors_outgoing(b).count(), 0);
        assert_eq!(contractor.neighbors_outgoing(c).count(), 1);

        assert_eq!(contractor.neighbors_incoming(a).count(), 0);
        assert_eq!(contractor.neighbors_incoming(b).count(), 1);
        assert_eq!(contractor.neighbors_incoming(c).count(), 0);
    }

    /// Dijkstra over the current graph that never enters `avoided`,
    /// mirroring what the contracted remainder of the graph looks like.
    fn dist_avoiding(
        g: &Graph,
        source: NodeIndex,
        target: NodeIndex,
        avoided: &FxHashSet<NodeIndex>,
    ) -> Weight {
        use crate::search::dijkstra::Candidate;
        use std::collections::BinaryHeap;

        let mut dist: FxHashMap<NodeIndex, Weight> = FxHashMap::default();
        let mut queue = BinaryHeap::new();
        dist.insert(source, 0.0);
        queue.push(Candidate::new(source, 0.0));

        while let Some(Candidate { node_idx, weight }) = queue.pop() {
            if node_idx == target {
                return weight;
            }
            if weight > *dist.get(&node_idx).unwrap_or(&Weight::INFINITY) {
                continue;
            }
            for (_, edge) in g.neighbors_outgoing(node_idx) {
                if avoided.contains(&edge.target) && edge.target != target {
                    continue;
                }
                let next = weight + edge.weight;
                if next < *dist.get(&edge.target).unwrap_or(&Weight::INFINITY) {
                    dist.insert(edge.target, next);
                    queue.push(Candidate::new(edge.target, next));
                }
            }
        }

        Weight::INFINITY
    }

    /// Checks after every contraction that distances between the contracted
    /// node's neighbors are preserved once the node is gone.
    struct DistancePreservationObserver {
        contracted: FxHashSet<NodeIndex>,
        before: FxHashMap<(NodeIndex, NodeIndex), Weight>,
        checked_pairs: usize,
    }

    impl ContractionObserver for DistancePreservationObserver {
        fn on_before_contraction(
            &mut self,
            g: &Graph,
            node: NodeIndex,
            neighbor_edges: &[(EdgeIndex, Edge)],
        ) {
            self.before.clear();
            for (_, e1) in neighbor_edges {
                for (_, e2) in neighbor_edges {
                    let u = if e1.source == node { e1.target } else { e1.source };
                    let w = if e2.source == node { e2.target } else { e2.source };
                    if u == w {
                        continue;
                    }
                    self.before
                        .insert((u, w), dist_avoiding(g, u, w, &self.contracted));
                }
            }
        }

        fn on_after_contraction(
            &mut self,
            g: &Graph,
            node: NodeIndex,
            _neighbor_edges: &[(EdgeIndex, Edge)],
        ) {
            self.contracted.insert(node);
            for ((u, w), before) in &self.before {
                let after = dist_avoiding(g, *u, *w, &self.contracted);
                if before.is_finite() {
                    assert_abs_diff_eq!(*before, after, epsilon = 1e-4);
                } else {
                    assert!(after.is_infinite());
                }
                self.checked_pairs += 1;
            }
        }
    }

    #[test]
    fn every_contraction_step_preserves_distances() {
        init_log();
        let mut g = generate_complex_graph();

        let mut observer = DistancePreservationObserver {
            contracted: FxHashSet::default(),
            before: FxHashMap::default(),
            checked_pairs: 0,
        };

        let mut contractor = NodeContractor::new(&mut g);
        contractor.run_with_observer(ContractionStrategy::default(), &mut observer);

        assert!(observer.checked_pairs > 0);
    }

    #[test]
    fn witness_suppresses_redundant_shortcut() {
        // u -> v -> w with a cheaper detour u -> x -> w: contracting v must
        // not add a shortcut.
        let mut g = Graph::new();
        let u = g.add_vertex(0.0, 0.0);
        let v = g.add_vertex(0.0, 0.0);
        let w = g.add_vertex(0.0, 0.0);
        let x = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(u => v, 2.0));
        g.add_edge(edge!(v => w, 2.0));
        g.add_edge(edge!(u => x, 1.0));
        g.add_edge(edge!(x => w, 1.0));

        let node_order = vec![v, u, x, w];
        let mut contractor = NodeContractor::new(&mut g);
        contractor.run_with_order(&node_order);

        assert_eq!(0, contractor.g.num_shortcuts);
    }

    #[test]
    fn missing_witness_forces_shortcut() {
        // u -> v -> w with a more expensive detour: the shortcut is
        // required.
        let mut g = Graph::new();
        let u = g.add_vertex(0.0, 0.0);
        let v = g.add_vertex(0.0, 0.0);
        let w = g.add_vertex(0.0, 0.0);
        let x = g.add_vertex(0.0, 0.0);

        g.add_edge(edge!(u => v, 1.0));
        g.add_edge(edge!(v => w, 1.0));
        g.add_edge(edge!(u => x, 5.0));
        g.add_edge(edge!(x => w, 5.0));

        let node_order = vec![v, u, x, w];
        let mut contractor = NodeContractor::new(&mut g);
        contractor.run_with_order(&node_order);

        assert_eq!(1, contractor.g.num_shortcuts);
        let shortcut = contractor
            .g
            .edges()
            .find(|e| e.is_shortcut())
            .expect("Shortcut must exist");
        assert_eq!(shortcut.source, u);
        assert_eq!(shortcut.target, w);
        assert_eq!(shortcut.via, Some(v));
        assert_abs_diff_eq!(shortcut.weight, 2.0);
    }

    #[test]
    fn observer_sees_every_node() {
        struct CountingObserver {
            before: usize,
            after: usize,
        }

        impl ContractionObserver for CountingObserver {
            fn on_before_contraction(
                &mut self,
                _g: &Graph,
                _node: NodeIndex,
                _neighbor_edges: &[(EdgeIndex, Edge)],
            ) {
                self.before += 1;
            }

            fn on_after_contraction(
                &mut self,
                _g: &Graph,
                _node: NodeIndex,
                _neighbor_edges: &[(EdgeIndex, Edge)],
            ) {
                self.after += 1;
            }
        }

        let mut g = generate_complex_graph();
        let num_nodes = g.nodes.len();

        let mut observer = CountingObserver {
            before: 0,
            after: 0,
        };
        let mut contractor = NodeContractor::new(&mut g);
        contractor.run_with_observer(ContractionStrategy::default(), &mut observer);

        assert_eq!(num_nodes, observer.before);
        assert_eq!(num_nodes, observer.after);
    }

    #[test]
    fn contracted_graph_answers_like_dijkstra() {
        init_log();
        let mut g = generate_complex_graph();
        let pristine = g.clone();

        let mut contractor = NodeContractor::new(&mut g);
        let overlay_graph = contractor.run();

        let mut dijkstra = Dijkstra::new(&pristine);
        let mut ch = crate::search::ch_search::CHSearch::new(&overlay_graph);

        for s in 0..pristine.nodes.len() {
            for t in 0..pristine.nodes.len() {
                let expected = dijkstra.search(node_index(s), node_index(t));
                let got = ch.search(node_index(s), node_index(t));

                match (expected, got) {
                    (Some(d), Some(c)) => {
                        assert_abs_diff_eq!(d.weight, c.weight, epsilon = 1e-4)
                    }
                    (None, None) => {}
                    (e, g) => panic!("Dijkstra {:?} and CH {:?} disagree for {s}->{t}", e, g),
                }
            }
        }
    }
}
