use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    constants::Weight,
    graph::{DefaultIdx, IndexType, NodeIndex},
    node_contraction::NodeContractor,
};

#[derive(Debug)]
struct Candidate<Idx = DefaultIdx> {
    node_idx: NodeIndex<Idx>,
    weight: Weight,
    hops: usize,
}

impl<Idx: IndexType> Candidate<Idx> {
    fn new(node_idx: NodeIndex<Idx>, weight: Weight, hops: usize) -> Self {
        Self {
            node_idx,
            weight,
            hops,
        }
    }
}

impl<Idx: IndexType> PartialOrd for Candidate<Idx> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        other.weight.partial_cmp(&self.weight)
    }
}

impl<Idx: IndexType> PartialEq for Candidate<Idx> {
    fn eq(&self, other: &Self) -> bool {
        other.weight == self.weight
    }
}

impl<Idx: IndexType> Eq for Candidate<Idx> {}

impl<Idx: IndexType> Ord for Candidate<Idx> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .weight
            .partial_cmp(&self.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// Bounded one-to-many Dijkstra over the uncontracted remainder of the
/// graph, used to decide whether a shortcut is required. The search never
/// passes through `avoid` and gives up once the settled or hop budget is
/// exhausted; giving up counts as "no witness found".
pub(crate) struct WitnessSearch<'a, 'g> {
    contractor: &'a NodeContractor<'g>,
    max_nodes_settled: usize,
    max_hops: usize,
}

impl<'a, 'g> WitnessSearch<'a, 'g> {
    pub(crate) fn with_params(
        contractor: &'a NodeContractor<'g>,
        max_nodes_settled: usize,
        max_hops: usize,
    ) -> Self {
        Self {
            contractor,
            max_nodes_settled,
            max_hops,
        }
    }

    /// Distances from `start` to every node reached within the bounds,
    /// avoiding `avoid`. Stops early once all `targets` are settled or the
    /// queue minimum exceeds `max_weight`.
    pub(crate) fn search(
        &self,
        start: NodeIndex,
        targets: &[NodeIndex],
        avoid: NodeIndex,
        max_weight: Weight,
    ) -> FxHashMap<NodeIndex, Weight> {
        let mut nodes_settled = 0;
        let mut targets_settled = 0;

        let mut node_data = FxHashMap::default();
        let mut settled = FxHashSet::default();
        let mut queue = BinaryHeap::new();

        node_data.insert(start, 0.0);
        queue.push(Candidate::new(start, 0.0, 0));

        while let Some(Candidate {
            weight,
            node_idx,
            hops,
        }) = queue.pop()
        {
            if nodes_settled >= self.max_nodes_settled || weight > max_weight {
                break;
            }

            if !settled.insert(node_idx) {
                continue;
            }
            nodes_settled += 1;

            if hops < self.max_hops {
                for (_, edge) in self.contractor.neighbors_outgoing(node_idx) {
                    if edge.target == avoid {
                        continue;
                    }

                    let new_distance = weight + edge.weight;
                    if new_distance < *node_data.get(&edge.target).unwrap_or(&Weight::INFINITY) {
                        node_data.insert(edge.target, new_distance);
                        queue.push(Candidate::new(edge.target, new_distance, hops + 1));
                    }
                }
            }

            if targets.contains(&node_idx) {
                targets_settled += 1;
                if targets_settled == targets.len() {
                    break;
                }
            }
        }

        node_data
    }

    /// True if a path `source -> ... -> target` avoiding `via` with weight
    /// at most `max_weight` was found within the bounds.
    pub(crate) fn has_witness(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        via: NodeIndex,
        max_weight: Weight,
    ) -> bool {
        let res = self.search(source, &[target], via, max_weight);
        res.get(&target).is_some_and(|w| *w <= max_weight)
    }
}
