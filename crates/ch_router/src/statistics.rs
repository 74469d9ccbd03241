use std::{
    fmt::{Debug, Display},
    time::{Duration, Instant},
};

use histogram::Histogram;

use crate::graph::Graph;

#[derive(Debug, Default)]
pub struct SearchStats {
    pub nodes_settled: usize,
    pub duration: Option<Duration>,
    start_time: Option<Instant>,
}

impl SearchStats {
    pub fn init(&mut self) {
        self.nodes_settled = 0;
        self.start_timer();
    }

    fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        if let Some(start_time) = self.start_time {
            self.duration = Some(start_time.elapsed());
        }
    }
}

impl Display for SearchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stats: {} nodes settled in {:?}",
            self.nodes_settled, self.duration
        )
    }
}

fn degree_histogram(g: &Graph, outgoing: bool) -> Histogram {
    let hist = Histogram::new(0, 10, 30).unwrap();
    for node in 0..g.nodes.len() {
        if outgoing {
            let degree = g.edges_out[node].len();
            hist.increment(degree as u64, 1).unwrap();
        } else {
            let degree = g.edges_in[node].len();
            hist.increment(degree as u64, 1).unwrap();
        }
    }
    hist
}

pub fn degree_out_hist(g: &Graph) -> Histogram {
    degree_histogram(g, true)
}

pub fn degree_in_hist(g: &Graph) -> Histogram {
    degree_histogram(g, false)
}

pub fn average_in_degree(g: &Graph) -> f64 {
    let mut sum = 0.0;
    for node in 0..g.nodes.len() {
        sum += g.edges_in[node].len() as f64;
    }
    sum / g.nodes.len() as f64
}

pub fn average_out_degree(g: &Graph) -> f64 {
    let mut sum = 0.0;
    for node in 0..g.nodes.len() {
        sum += g.edges_out[node].len() as f64;
    }
    sum / g.nodes.len() as f64
}

#[cfg(test)]
mod tests {
    use crate::{
        graph::node_index,
        search::dijkstra::Dijkstra,
        util::test_graphs::{generate_complex_graph, generate_line_graph},
    };

    use super::*;

    #[test]
    fn stats_work() {
        let g = {
            let mut g = generate_line_graph();
            g.add_vertex(0.0, 0.0); // unreachable extra node
            g
        };

        let mut d = Dijkstra::new(&g);
        d.search(node_index(0), node_index(4));

        assert!(d.stats.duration.is_some());
        assert_eq!(d.stats.nodes_settled, 5);
    }

    #[test]
    fn degree_hists_count_every_node() {
        let g = generate_complex_graph();

        let out_hist = degree_out_hist(&g);
        let total: u64 = out_hist.into_iter().map(|bucket| bucket.count() as u64).sum();
        assert_eq!(total, g.nodes.len() as u64);

        let in_hist = degree_in_hist(&g);
        let total: u64 = in_hist.into_iter().map(|bucket| bucket.count() as u64).sum();
        assert_eq!(total, g.nodes.len() as u64);
    }

    #[test]
    fn average_degrees() {
        let g = generate_line_graph();

        // Bidirectional line: 4 arcs, every arc appears in two out-lists
        assert!((average_out_degree(&g) - 8.0 / 5.0).abs() < 1e-9);
        assert!((average_in_degree(&g) - 8.0 / 5.0).abs() < 1e-9);
    }
}
