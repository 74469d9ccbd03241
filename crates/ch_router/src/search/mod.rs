use rustc_hash::FxHashMap;

use crate::{constants::Weight, graph::NodeIndex};

use self::shortest_path::ShortestPath;

pub mod ch_search;
pub mod dijkstra;
pub mod path_segment;
pub mod shortest_path;
pub mod visit_list;

pub use ch_search::CHSearch;

pub fn reconstruct_path(
    target: NodeIndex,
    source: NodeIndex,
    node_data: &FxHashMap<NodeIndex, (Weight, Option<NodeIndex>)>,
) -> Option<ShortestPath> {
    let mut path = vec![target];
    let weight = node_data.get(&target)?.0;

    let mut previous_node = node_data.get(&target)?.1?;

    while let Some(prev_node) = node_data.get(&previous_node)?.1 {
        path.push(previous_node);
        previous_node = prev_node;
    }
    path.push(source);
    path.reverse();
    Some(ShortestPath::new(path, weight))
}

#[cfg(test)]
pub(crate) fn assert_path(
    nodes: Vec<usize>,
    weight: crate::constants::Weight,
    sp: Option<ShortestPath>,
) {
    let sp = sp.expect("Path must exist");
    assert_eq!(
        nodes
            .into_iter()
            .map(crate::graph::node_index)
            .collect::<Vec<_>>(),
        sp.nodes
    );
    approx::assert_abs_diff_eq!(weight, sp.weight, epsilon = 1e-4);
}

#[cfg(test)]
pub(crate) fn assert_no_path(sp: Option<ShortestPath>) {
    assert!(sp.is_none(), "Expected no path, got {:?}", sp);
}
