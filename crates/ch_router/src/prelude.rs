//! Re-exports of the most commonly used items in `ch_router`.
pub use crate::contraction_params::{ContractionParams, PriorityParams};
pub use crate::contraction_strategy::{ContractionStrategy, UpdateStrategy};
pub use crate::graph_file::{freeze, MappedGraph};
pub use crate::node_contraction::{ContractionObserver, NodeContractor};
pub use crate::overlay_graph::{HierarchyGraph, OverlayGraph};

pub use crate::search;
pub use crate::search::ch_search::CHSearch;
pub use crate::search::path_segment::PathSegment;
pub use crate::search::visit_list::VisitList;

pub use crate::graph::node_index;
pub use crate::graph::Graph;
