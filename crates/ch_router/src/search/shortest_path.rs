use std::rc::Rc;

use crate::{constants::Weight, graph::NodeIndex};

use super::path_segment::PathSegment;

#[derive(Debug, PartialEq, Clone)]
pub struct ShortestPath<Idx = crate::graph::DefaultIdx> {
    pub nodes: Vec<NodeIndex<Idx>>,
    pub weight: Weight,
}

impl ShortestPath {
    pub fn new(nodes: Vec<NodeIndex>, weight: Weight) -> Self {
        ShortestPath { nodes, weight }
    }
}

impl From<&Rc<PathSegment>> for ShortestPath {
    fn from(segment: &Rc<PathSegment>) -> Self {
        ShortestPath::new(segment.to_vec(), segment.weight())
    }
}
