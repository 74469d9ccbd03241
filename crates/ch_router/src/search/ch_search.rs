//! Bidirectional shortest path search over a contracted graph.
use std::rc::Rc;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::{
    constants::Weight,
    graph::NodeIndex,
    overlay_graph::HierarchyGraph,
    statistics::SearchStats,
};

use super::{path_segment::PathSegment, shortest_path::ShortestPath, visit_list::VisitList};

/// Point-to-point query engine. Expands forward from the source set and
/// backward from the target set, both strictly upward in the hierarchy,
/// and meets near the top. All per-query state lives in this struct, so
/// any number of searches may run concurrently on one shared graph.
pub struct CHSearch<'a, G: HierarchyGraph> {
    pub stats: SearchStats,
    g: &'a G,

    settled_fwd: FxHashMap<NodeIndex, Rc<PathSegment>>,
    settled_bwd: FxHashMap<NodeIndex, Rc<PathSegment>>,
}

impl<'a, G: HierarchyGraph> CHSearch<'a, G> {
    pub fn new(graph: &'a G) -> Self {
        CHSearch {
            g: graph,
            stats: SearchStats::default(),
            settled_fwd: FxHashMap::default(),
            settled_bwd: FxHashMap::default(),
        }
    }

    fn init(&mut self) {
        self.settled_fwd.clear();
        self.settled_bwd.clear();
        self.stats.init();
    }

    /// Single-pair convenience query without a weight bound.
    pub fn search(&mut self, source: NodeIndex, target: NodeIndex) -> Option<ShortestPath> {
        self.search_with_max_weight(source, target, Weight::INFINITY)
    }

    pub fn search_with_max_weight(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        max_weight: Weight,
    ) -> Option<ShortestPath> {
        let path = self.calculate(
            VisitList::from_vertex(source),
            VisitList::from_vertex(target),
            max_weight,
        )?;
        Some(ShortestPath::from(&path))
    }

    /// Runs the bidirectional search between two seeded visit lists and
    /// returns the unpacked path, or `None` if source and target do not
    /// meet within `max_weight`.
    pub fn calculate(
        &mut self,
        mut fwd_visits: VisitList,
        mut bwd_visits: VisitList,
        max_weight: Weight,
    ) -> Option<Rc<PathSegment>> {
        self.init();
        info!("BEGIN CH SEARCH");

        // Best known meeting vertex and total weight over all vertices
        // settled from both sides.
        let mut best: Option<(Weight, NodeIndex)> = None;

        loop {
            let best_weight = best.map_or(Weight::INFINITY, |(weight, _)| weight);
            let bound = best_weight.min(max_weight);

            // A direction stops once its queue minimum exceeds the best
            // known total; the search stops once both are done.
            let fwd_active = fwd_visits.peek_weight().is_some_and(|w| w <= bound);
            let bwd_active = bwd_visits.peek_weight().is_some_and(|w| w <= bound);

            if !fwd_active && !bwd_active {
                break;
            }

            if fwd_active {
                self.settle_forward(&mut fwd_visits, &mut best);
            }
            if bwd_active {
                self.settle_backward(&mut bwd_visits, &mut best);
            }
        }

        self.stats.finish();

        match best {
            Some((weight, meet)) => {
                debug!("Meeting vertex: {:?}", meet);
                info!("{}, weight: {}", self.stats, weight);
                self.build_path(meet)
            }
            None => {
                info!("No path found");
                None
            }
        }
    }

    fn settle_forward(
        &mut self,
        visits: &mut VisitList,
        best: &mut Option<(Weight, NodeIndex)>,
    ) {
        let Some(segment) = visits.get_first() else {
            return;
        };
        let vertex = segment.vertex();

        if self.settled_fwd.contains_key(&vertex) {
            return;
        }

        // Stall on demand: a settled higher neighbor that reaches this
        // vertex cheaper proves the entry suboptimal.
        for link in self.g.links_bwd(vertex) {
            if let Some(upper) = self.settled_fwd.get(&link.node) {
                if upper.weight() + link.weight < segment.weight() {
                    return;
                }
            }
        }

        self.stats.nodes_settled += 1;

        if let Some(other) = self.settled_bwd.get(&vertex) {
            let total = segment.weight() + other.weight();
            if best.map_or(true, |(weight, _)| total < weight) {
                debug!("FWD: new best weight: {}", total);
                *best = Some((total, vertex));
            }
        }

        for link in self.g.links_fwd(vertex) {
            let weight = segment.weight() + link.weight;
            visits.update_vertex(PathSegment::extend(
                &segment,
                link.node,
                weight,
                Some(link.edge),
            ));
        }

        self.settled_fwd.insert(vertex, segment);
    }

    fn settle_backward(
        &mut self,
        visits: &mut VisitList,
        best: &mut Option<(Weight, NodeIndex)>,
    ) {
        let Some(segment) = visits.get_first() else {
            return;
        };
        let vertex = segment.vertex();

        if self.settled_bwd.contains_key(&vertex) {
            return;
        }

        for link in self.g.links_fwd(vertex) {
            if let Some(upper) = self.settled_bwd.get(&link.node) {
                if upper.weight() + link.weight < segment.weight() {
                    return;
                }
            }
        }

        self.stats.nodes_settled += 1;

        if let Some(other) = self.settled_fwd.get(&vertex) {
            let total = segment.weight() + other.weight();
            if best.map_or(true, |(weight, _)| total < weight) {
                debug!("BWD: new best weight: {}", total);
                *best = Some((total, vertex));
            }
        }

        for link in self.g.links_bwd(vertex) {
            let weight = segment.weight() + link.weight;
            visits.update_vertex(PathSegment::extend(
                &segment,
                link.node,
                weight,
                Some(link.edge),
            ));
        }

        self.settled_bwd.insert(vertex, segment);
    }

    /// Stitches both partial paths together at the meeting vertex, unpacks
    /// every shortcut and rebuilds the route over original arcs only.
    fn build_path(&self, meet: NodeIndex) -> Option<Rc<PathSegment>> {
        let fwd_tip = self.settled_fwd.get(&meet)?;
        let bwd_tip = self.settled_bwd.get(&meet)?;

        // Overlay arcs along source -> meet -> target
        let mut overlay_edges = Vec::new();

        let mut current = fwd_tip;
        while let (Some(edge), Some(prev)) = (current.edge(), current.previous()) {
            overlay_edges.push(edge);
            current = prev;
        }
        let origin = current.vertex();
        let origin_weight = current.weight();
        overlay_edges.reverse();

        let mut current = bwd_tip;
        while let (Some(edge), Some(prev)) = (current.edge(), current.previous()) {
            overlay_edges.push(edge);
            current = prev;
        }
        let target_offset = current.weight();

        // Substitute shortcuts until only original arcs remain
        let mut unpacked = Vec::new();
        for edge in &overlay_edges {
            self.g.expand_edge(*edge, &mut unpacked);
        }
        debug!("Unpacked {} arcs", unpacked.len());

        if unpacked.is_empty() {
            return Some(PathSegment::root_with_weight(
                origin,
                origin_weight + target_offset,
            ));
        }

        let mut segment = PathSegment::root_with_weight(origin, origin_weight);
        let mut vertex = origin;
        let last = unpacked.len() - 1;
        for (i, edge) in unpacked.iter().enumerate() {
            let (a, b) = self.g.edge_endpoints(*edge);
            let next = if a == vertex { b } else { a };
            let mut weight = segment.weight() + self.g.edge_weight(*edge);
            // Any trailing seed weight of the target side lands on the
            // final vertex.
            if i == last {
                weight += target_offset;
            }
            segment = PathSegment::extend(&segment, next, weight, Some(*edge));
            vertex = next;
        }

        Some(segment)
    }
}
