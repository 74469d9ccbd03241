//! Parameters for the contraction algorithm

/// Parameters for the contraction algorithm
#[derive(Debug, Clone, Copy)]
pub struct ContractionParams {
    pub(crate) priority_params: PriorityParams,
    // Limit for lazy updates
    pub(crate) witness_search_limit: usize,
    // Limit for initial node ordering
    pub(crate) witness_search_initial_limit: usize,
    // Hop limit for witness searches
    pub(crate) witness_hop_limit: usize,
    // Run the per-pair witness searches of one contraction step on scoped
    // threads. Shortcuts are committed only after all searches finished.
    pub(crate) parallel_witness: bool,
}

impl ContractionParams {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn priority_params(mut self, params: PriorityParams) -> Self {
        self.priority_params = params;
        self
    }

    pub fn witness_search_limit(mut self, limit: usize) -> Self {
        self.witness_search_limit = limit;
        self
    }

    pub fn witness_search_initial_limit(mut self, limit: usize) -> Self {
        self.witness_search_initial_limit = limit;
        self
    }

    pub fn witness_hop_limit(mut self, limit: usize) -> Self {
        self.witness_hop_limit = limit;
        self
    }

    pub fn parallel_witness(mut self, parallel: bool) -> Self {
        self.parallel_witness = parallel;
        self
    }
}

impl Default for ContractionParams {
    fn default() -> Self {
        ContractionParams {
            priority_params: Default::default(),
            witness_search_limit: 50,
            witness_search_initial_limit: 500,
            witness_hop_limit: 16,
            parallel_witness: false,
        }
    }
}

/// Parameters for the priority function
/// P(v) = edge_difference_coeff * edge_difference(v)
///     + contracted_neighbors_coeff * contracted_neighbors(v)
///     + search_space_coeff * Level(v)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityParams {
    pub(crate) edge_difference_coeff: i32,
    pub(crate) contracted_neighbors_coeff: i32,
    pub(crate) search_space_coeff: i32,
}

impl PriorityParams {
    pub fn new(
        edge_difference_coeff: i32,
        contracted_neighbors_coeff: i32,
        search_space_coeff: i32,
    ) -> Self {
        PriorityParams {
            edge_difference_coeff,
            contracted_neighbors_coeff,
            search_space_coeff,
        }
    }

    /// The textbook ordering: shortcuts added minus edges removed, nothing
    /// else.
    pub fn edge_difference_only() -> Self {
        PriorityParams {
            edge_difference_coeff: 1,
            contracted_neighbors_coeff: 0,
            search_space_coeff: 0,
        }
    }

    pub fn edge_difference_coeff(mut self, coeff: i32) -> Self {
        self.edge_difference_coeff = coeff;
        self
    }

    pub fn contracted_neighbors_coeff(mut self, coeff: i32) -> Self {
        self.contracted_neighbors_coeff = coeff;
        self
    }

    pub fn search_space_coeff(mut self, coeff: i32) -> Self {
        self.search_space_coeff = coeff;
        self
    }
}

impl Default for PriorityParams {
    fn default() -> Self {
        PriorityParams {
            edge_difference_coeff: 101,
            contracted_neighbors_coeff: 101,
            search_space_coeff: 6,
        }
    }
}
