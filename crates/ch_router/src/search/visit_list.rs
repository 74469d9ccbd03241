use std::{collections::BinaryHeap, rc::Rc};

use rustc_hash::FxHashMap;

use crate::{
    constants::Weight,
    graph::NodeIndex,
};

use super::{dijkstra::Candidate, path_segment::PathSegment};

/// Best-known path per vertex, ordered by cumulative weight. Entries are
/// only ever replaced by strictly better ones; the heap keeps stale
/// candidates around and skips them lazily on pop.
#[derive(Default)]
pub struct VisitList {
    paths: FxHashMap<NodeIndex, Rc<PathSegment>>,
    queue: BinaryHeap<Candidate>,
}

impl VisitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list seeded with a single zero-weight vertex.
    pub fn from_vertex(vertex: NodeIndex) -> Self {
        let mut list = Self::new();
        list.update_vertex(PathSegment::root(vertex));
        list
    }

    /// Stores `segment` as the path to its vertex, unless a path of equal
    /// or lower weight is already known. Returns whether the list changed.
    pub fn update_vertex(&mut self, segment: Rc<PathSegment>) -> bool {
        let vertex = segment.vertex();
        match self.paths.get(&vertex) {
            Some(current) if current.weight() <= segment.weight() => false,
            _ => {
                self.queue.push(Candidate::new(vertex, segment.weight()));
                self.paths.insert(vertex, segment);
                true
            }
        }
    }

    /// Pops and removes the globally minimum-weight segment.
    pub fn get_first(&mut self) -> Option<Rc<PathSegment>> {
        while let Some(Candidate { node_idx, weight }) = self.queue.pop() {
            match self.paths.get(&node_idx) {
                Some(segment) if segment.weight() == weight => {
                    return self.paths.remove(&node_idx);
                }
                // A better path replaced this candidate, or the vertex was
                // already popped.
                _ => continue,
            }
        }
        None
    }

    /// Weight of the minimum entry without removing it.
    pub fn peek_weight(&mut self) -> Option<Weight> {
        loop {
            let (node_idx, weight) = {
                let candidate = self.queue.peek()?;
                (candidate.node_idx, candidate.weight)
            };
            match self.paths.get(&node_idx) {
                Some(segment) if segment.weight() == weight => return Some(weight),
                _ => {
                    self.queue.pop();
                }
            }
        }
    }

    pub fn contains(&self, vertex: NodeIndex) -> bool {
        self.paths.contains_key(&vertex)
    }

    pub fn get_path_to(&self, vertex: NodeIndex) -> Option<Rc<PathSegment>> {
        self.paths.get(&vertex).cloned()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
