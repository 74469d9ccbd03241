use std::rc::Rc;

use anyhow::{ensure, Result};

use crate::{
    constants::Weight,
    graph::{EdgeIndex, NodeIndex},
};

/// One vertex on a path, linked to its predecessor. Segments are immutable
/// and reference counted, so any number of live paths may share a common
/// tail; branching during a search is a cheap `Rc::clone` of the
/// predecessor. `edge` is the arc that led here from the predecessor,
/// absent on roots.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    vertex: NodeIndex,
    weight: Weight,
    edge: Option<EdgeIndex>,
    previous: Option<Rc<PathSegment>>,
}

impl PathSegment {
    pub fn root(vertex: NodeIndex) -> Rc<Self> {
        Self::root_with_weight(vertex, 0.0)
    }

    /// A root carrying an initial weight, e.g. the cost of reaching the
    /// vertex from a point off the graph.
    pub fn root_with_weight(vertex: NodeIndex, weight: Weight) -> Rc<Self> {
        Rc::new(PathSegment {
            vertex,
            weight,
            edge: None,
            previous: None,
        })
    }

    pub fn extend(
        previous: &Rc<PathSegment>,
        vertex: NodeIndex,
        weight: Weight,
        edge: Option<EdgeIndex>,
    ) -> Rc<Self> {
        Rc::new(PathSegment {
            vertex,
            weight,
            edge,
            previous: Some(Rc::clone(previous)),
        })
    }

    pub fn vertex(&self) -> NodeIndex {
        self.vertex
    }

    /// Cumulative weight from the first vertex up to this one.
    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn edge(&self) -> Option<EdgeIndex> {
        self.edge
    }

    pub fn previous(&self) -> Option<&Rc<PathSegment>> {
        self.previous.as_ref()
    }

    /// The first segment of the chain.
    pub fn first(&self) -> &PathSegment {
        let mut current = self;
        while let Some(prev) = &current.previous {
            current = prev;
        }
        current
    }

    /// Number of vertices on the path.
    pub fn len(&self) -> usize {
        let mut count = 1;
        let mut current = self;
        while let Some(prev) = &current.previous {
            count += 1;
            current = prev;
        }
        count
    }

    /// The segments from tip to root.
    fn chain(&self) -> Vec<&PathSegment> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(prev) = &current.previous {
            chain.push(prev);
            current = prev;
        }
        chain
    }

    /// Materializes the vertex sequence, first to tip.
    pub fn to_vec(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.chain().iter().map(|s| s.vertex).collect();
        nodes.reverse();
        nodes
    }

    /// A fresh chain walking the path in the opposite direction. Weights
    /// are re-accumulated from the far end; the arc between two vertices
    /// stays between them.
    pub fn reverse(self: &Rc<Self>) -> Rc<PathSegment> {
        let total = self.weight;
        let chain = self.chain(); // tip to root

        let mut reversed = PathSegment::root_with_weight(chain[0].vertex, 0.0);
        for (next, current) in chain.iter().skip(1).zip(chain.iter()) {
            reversed = PathSegment::extend(
                &reversed,
                next.vertex,
                total - next.weight,
                current.edge,
            );
        }
        reversed
    }

    /// Appends this path after `other`. The first vertex of `self` must be
    /// the tip of `other`; weights of `self` are shifted onto `other`'s
    /// scale.
    pub fn concatenate_after(self: &Rc<Self>, other: &Rc<Self>) -> Result<Rc<PathSegment>> {
        let first = self.first();
        ensure!(
            first.vertex == other.vertex,
            "Cannot concatenate: path starts at vertex {} but should continue from {}",
            first.vertex.index(),
            other.vertex.index()
        );

        let offset = other.weight - first.weight;

        let mut chain = self.chain();
        chain.reverse(); // root to tip

        let mut segment = Rc::clone(other);
        for part in chain.iter().skip(1) {
            segment = PathSegment::extend(&segment, part.vertex, part.weight + offset, part.edge);
        }
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::graph::node_index;

    use super::*;

    fn sample_path() -> Rc<PathSegment> {
        // 0 -(2.0)- 1 -(3.0)- 2
        let root = PathSegment::root(node_index(0));
        let mid = PathSegment::extend(&root, node_index(1), 2.0, Some(0.into()));
        PathSegment::extend(&mid, node_index(2), 5.0, Some(1.into()))
    }

    #[test]
    fn first_len_to_vec() {
        let tip = sample_path();

        assert_eq!(tip.first().vertex(), node_index(0));
        assert_eq!(tip.len(), 3);
        assert_eq!(
            tip.to_vec(),
            vec![node_index(0), node_index(1), node_index(2)]
        );
        assert_abs_diff_eq!(tip.weight(), 5.0);
    }

    #[test]
    fn reverse_recomputes_weights() {
        let tip = sample_path();
        let reversed = tip.reverse();

        assert_eq!(
            reversed.to_vec(),
            vec![node_index(2), node_index(1), node_index(0)]
        );
        assert_abs_diff_eq!(reversed.weight(), 5.0);

        // Cumulative weight at the middle vertex is now the far half
        let mid = reversed.previous().unwrap();
        assert_eq!(mid.vertex(), node_index(1));
        assert_abs_diff_eq!(mid.weight(), 3.0);
        // Arcs stay attached to the pair they connect
        assert_eq!(mid.edge(), Some(1.into()));
    }

    #[test]
    fn concatenate_after_joins_at_shared_vertex() {
        let front = sample_path(); // 0 - 1 - 2, weight 5

        let back_root = PathSegment::root(node_index(2));
        let back = PathSegment::extend(&back_root, node_index(3), 4.0, Some(2.into()));

        let joined = back.concatenate_after(&front).unwrap();

        assert_eq!(
            joined.to_vec(),
            vec![node_index(0), node_index(1), node_index(2), node_index(3)]
        );
        assert_abs_diff_eq!(joined.weight(), 9.0);
        assert_eq!(joined.len(), 4);
    }

    #[test]
    fn concatenate_after_rejects_disjoint_paths() {
        let front = sample_path();
        let back = PathSegment::root(node_index(7));

        assert!(back.concatenate_after(&front).is_err());
    }

    #[test]
    fn branches_share_their_tail() {
        let root = PathSegment::root(node_index(0));
        let mid = PathSegment::extend(&root, node_index(1), 1.0, None);

        let branch_a = PathSegment::extend(&mid, node_index(2), 2.0, None);
        let branch_b = PathSegment::extend(&mid, node_index(3), 3.0, None);

        assert!(Rc::ptr_eq(
            branch_a.previous().unwrap(),
            branch_b.previous().unwrap()
        ));
        assert_eq!(branch_a.first().vertex(), branch_b.first().vertex());
    }
}
