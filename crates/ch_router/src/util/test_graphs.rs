use crate::{
    edge,
    graph::Graph,
};

pub fn generate_complex_graph() -> Graph {
    let mut graph = Graph::new();

    let a = graph.add_vertex(6.0, 2.0);
    let b = graph.add_vertex(3.0, 3.0);
    let c = graph.add_vertex(4.0, 6.0);
    let d = graph.add_vertex(2.0, 7.0);
    let e = graph.add_vertex(3.0, 10.0);
    let f = graph.add_vertex(2.0, 13.0);
    let g = graph.add_vertex(7.0, 15.0);
    let h = graph.add_vertex(5.0, 12.0);
    let i = graph.add_vertex(7.0, 11.0);
    let j = graph.add_vertex(5.0, 9.0);
    let k = graph.add_vertex(7.0, 7.0);

    graph.add_edge(edge!(a, b, 3.0)); // A <=> B
    graph.add_edge(edge!(a, c, 5.0)); // A <=> C
    graph.add_edge(edge!(a, k, 3.0)); // A <=> K

    graph.add_edge(edge!(b, d, 5.0)); // B <=> D
    graph.add_edge(edge!(b, c, 3.0)); // B <=> C

    graph.add_edge(edge!(c, d, 2.0)); // C <=> D
    graph.add_edge(edge!(c, j, 2.0)); // C <=> J

    graph.add_edge(edge!(d, j, 4.0)); // D <=> J
    graph.add_edge(edge!(d, e, 7.0)); // D <=> E

    graph.add_edge(edge!(e, j, 3.0)); // E <=> J
    graph.add_edge(edge!(e, f, 6.0)); // E <=> F

    graph.add_edge(edge!(f, h, 2.0)); // F <=> H
    graph.add_edge(edge!(f, g, 4.0)); // F <=> G

    graph.add_edge(edge!(g, h, 3.0)); // G <=> H
    graph.add_edge(edge!(g, i, 5.0)); // G <=> I

    graph.add_edge(edge!(h, i, 3.0)); // H <=> I
    graph.add_edge(edge!(h, j, 2.0)); // H <=> J

    graph.add_edge(edge!(i, j, 4.0)); // I <=> J
    graph.add_edge(edge!(i, k, 6.0)); // I <=> K

    graph.add_edge(edge!(j, k, 3.0)); // J <=> K

    graph
}

pub fn generate_simple_graph() -> Graph {
    //           B
    //           |
    // E -> A -> C
    //      |  /
    //      D
    let mut g = Graph::new();

    let a = g.add_vertex(0.0, 0.0);
    let b = g.add_vertex(0.0, 0.0);
    let c = g.add_vertex(0.0, 0.0);
    let d = g.add_vertex(0.0, 0.0);
    let e = g.add_vertex(0.0, 0.0);

    g.add_edge(edge!(a => c, 1.0));
    g.add_edge(edge!(a => d, 1.0));
    g.add_edge(edge!(e => a, 1.0));
    g.add_edge(edge!(c, b, 1.0));
    g.add_edge(edge!(c, d, 1.0));

    g
}

/// A - B - C - D - E with weights 1, 2, 3, 4 in both directions.
pub fn generate_line_graph() -> Graph {
    let mut g = Graph::new();

    let a = g.add_vertex(0.0, 0.0);
    let b = g.add_vertex(0.0, 1.0);
    let c = g.add_vertex(0.0, 2.0);
    let d = g.add_vertex(0.0, 3.0);
    let e = g.add_vertex(0.0, 4.0);

    g.add_edge(edge!(a, b, 1.0));
    g.add_edge(edge!(b, c, 2.0));
    g.add_edge(edge!(c, d, 3.0));
    g.add_edge(edge!(d, e, 4.0));

    g
}
