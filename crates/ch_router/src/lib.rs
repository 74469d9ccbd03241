//! Crate to build contraction hierarchies and answer shortest path queries
//! on them.
//!
//! # Basic usage
//! ```no_run
//! use ch_router::prelude::*;
//!
//! // Build a graph through the vertex/arc API
//! let mut g = Graph::new();
//! let a = g.add_vertex(48.0, 11.0);
//! let b = g.add_vertex(48.1, 11.1);
//! g.add_arc(a, b, 60.0, true, true, None);
//!
//! // Contract it
//! let mut contractor = NodeContractor::new(&mut g);
//! let overlay_graph = contractor.run();
//!
//! // Query it
//! let mut ch = CHSearch::new(&overlay_graph);
//! if let Some(path) = ch.search(a, b) {
//!     println!("Costs: {}", path.weight);
//! }
//! ```
//!
//! [`Graph`]: crate::graph::Graph
pub mod constants;
pub mod contraction_params;
pub mod contraction_strategy;
pub mod graph;
pub mod graph_file;
pub mod node_contraction;
pub mod overlay_graph;
pub mod prelude;
pub mod search;
pub mod statistics;
pub mod util;
pub(crate) mod witness_search;
