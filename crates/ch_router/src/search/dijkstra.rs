use std::collections::BinaryHeap;

use crate::constants::Weight;
use crate::graph::*;
use crate::search::shortest_path::ShortestPath;
use crate::statistics::SearchStats;
use log::{debug, info};
use rustc_hash::FxHashMap;

#[derive(Debug)]
pub(crate) struct Candidate<Idx = DefaultIdx> {
    pub(crate) node_idx: NodeIndex<Idx>,
    pub(crate) weight: Weight,
}

impl Candidate {
    pub(crate) fn new(node_idx: NodeIndex, weight: Weight) -> Self {
        Self { node_idx, weight }
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        other.weight.partial_cmp(&self.weight)
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        other.weight == self.weight
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .weight
            .partial_cmp(&self.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Unrestricted single-pair Dijkstra over the original (uncontracted)
/// edges. The baseline every hierarchy query must agree with.
pub struct Dijkstra<'a, Idx = DefaultIdx> {
    pub stats: SearchStats,
    g: &'a Graph<Idx>,
}

impl<'a> Dijkstra<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Dijkstra {
            g: graph,
            stats: SearchStats::default(),
        }
    }

    pub fn search(&mut self, source: NodeIndex, target: NodeIndex) -> Option<ShortestPath> {
        self.stats.init();

        if source == target {
            self.stats.nodes_settled += 1;
            self.stats.finish();
            return Some(ShortestPath::new(vec![source], 0.0));
        }

        let mut node_data: FxHashMap<NodeIndex, (Weight, Option<NodeIndex>)> = FxHashMap::default();
        node_data.insert(source, (0.0, None));

        let mut queue = BinaryHeap::new();

        queue.push(Candidate::new(source, 0.0));

        while let Some(Candidate { weight, node_idx }) = queue.pop() {
            self.stats.nodes_settled += 1;

            if node_idx == target {
                break;
            }

            // Shortcuts do not exist for this search
            for (_, edge) in self
                .g
                .neighbors_outgoing(node_idx)
                .filter(|(_, edge)| !edge.is_shortcut())
            {
                let new_distance = weight + edge.weight;
                if new_distance
                    < node_data
                        .get(&edge.target)
                        .unwrap_or(&(Weight::INFINITY, None))
                        .0
                {
                    node_data.insert(edge.target, (new_distance, Some(node_idx)));
                    queue.push(Candidate::new(edge.target, new_distance));
                }
            }
        }
        self.stats.finish();

        let sp = super::reconstruct_path(target, source, &node_data);
        if sp.is_some() {
            debug!("Path found: {:?}", sp);
            info!(
                "Path found: {:?}/{} nodes settled",
                self.stats.duration.unwrap(),
                self.stats.nodes_settled
            );
        } else {
            info!(
                "No path found: {:?}/{} nodes settled",
                self.stats.duration.unwrap(),
                self.stats.nodes_settled
            );
        }

        sp
    }
}
