//! Flat, memory-mappable storage for a contracted graph.
//!
//! The file holds three append-only sections: a header, one vertex record
//! per node (position plus the index/count of its arc slice) and one arc
//! record per overlay edge. Every arc is stored once, at its lower-ranked
//! endpoint, with flags for the traversable directions; both search
//! directions therefore read nothing but the owner's slice, and the
//! hierarchy levels are implicit in arc placement. Shortcut arcs carry the
//! id of the contracted vertex, original arcs the sentinel
//! [`NO_INDEX`].
use std::{
    fs::File,
    io::{BufWriter, Write},
    ops::Range,
    path::Path,
};

use anyhow::{ensure, Context};
use bytemuck::{Pod, Zeroable};
use log::info;
use memmap2::Mmap;

use crate::{
    constants::Weight,
    graph::{EdgeIndex, NodeIndex},
    overlay_graph::{HierarchyGraph, Link, OverlayGraph},
};

const MAGIC: [u8; 8] = *b"CHGRAPH\0";
const VERSION: u32 = 1;

/// Sentinel for "no via vertex" / "no tag".
pub const NO_INDEX: u32 = u32::MAX;

/// Arc is traversable from its owner towards `target`.
const FLAG_FORWARD: u32 = 1;
/// Arc is traversable from `target` towards its owner.
const FLAG_BACKWARD: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct HeaderRecord {
    magic: [u8; 8],
    version: u32,
    num_nodes: u32,
    num_arcs: u32,
    _reserved: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VertexRecord {
    lat: f32,
    lon: f32,
    first_arc: u32,
    arc_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ArcRecord {
    target: u32,
    weight: f32,
    flags: u32,
    via: u32,
    tag: u32,
}

const HEADER_BYTES: usize = std::mem::size_of::<HeaderRecord>();
const VERTEX_BYTES: usize = std::mem::size_of::<VertexRecord>();
const ARC_BYTES: usize = std::mem::size_of::<ArcRecord>();

/// Writes the contracted graph to `path` and flushes it. The resulting
/// file is immutable and may be served read-only by any number of
/// concurrent readers through [`MappedGraph`].
pub fn freeze(overlay: &OverlayGraph, path: &Path) -> anyhow::Result<()> {
    let g = overlay.road_graph();
    let num_nodes = g.nodes.len();

    let mut vertices = Vec::with_capacity(num_nodes);
    let mut arcs: Vec<ArcRecord> = Vec::new();

    for v in 0..num_nodes {
        let node = NodeIndex::new(v);
        let first_arc = arcs.len() as u32;

        // Arcs owned by `v`: everything recorded at its contraction. A
        // bidirectional edge shows up in both lists but is stored once.
        let mut owned: Vec<EdgeIndex> = Vec::new();
        for edge_idx in overlay.edges_fwd[v].iter().chain(overlay.edges_bwd[v].iter()) {
            if !owned.contains(edge_idx) {
                owned.push(*edge_idx);
            }
        }

        for edge_idx in owned {
            let edge = overlay.edge(edge_idx);
            let (other, towards_other, towards_owner) = if edge.source == node {
                (edge.target, edge.forward, edge.backward)
            } else {
                (edge.source, edge.backward, edge.forward)
            };

            let mut flags = 0;
            if towards_other {
                flags |= FLAG_FORWARD;
            }
            if towards_owner {
                flags |= FLAG_BACKWARD;
            }

            arcs.push(ArcRecord {
                target: other.index() as u32,
                weight: edge.weight as f32,
                flags,
                via: edge.via.map_or(NO_INDEX, |n| n.index() as u32),
                tag: edge.tag.unwrap_or(NO_INDEX),
            });
        }

        let coords = &g.nodes[v];
        vertices.push(VertexRecord {
            lat: coords.lat as f32,
            lon: coords.lon as f32,
            first_arc,
            arc_count: arcs.len() as u32 - first_arc,
        });
    }

    let header = HeaderRecord {
        magic: MAGIC,
        version: VERSION,
        num_nodes: num_nodes as u32,
        num_arcs: arcs.len() as u32,
        _reserved: 0,
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create graph file {:?}", path))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytemuck::bytes_of(&header))?;
    writer.write_all(bytemuck::cast_slice(&vertices))?;
    writer.write_all(bytemuck::cast_slice(&arcs))?;
    writer.flush().context("Failed to flush graph file")?;

    info!(
        "Froze graph with {} nodes and {} arcs to {:?}",
        num_nodes,
        arcs.len(),
        path
    );
    Ok(())
}

/// Read-only, memory-mapped view of a frozen graph. Queries run directly
/// on the mapped arrays; the mapping is shareable across threads.
pub struct MappedGraph {
    mmap: Mmap,
    num_nodes: usize,
    num_arcs: usize,
}

impl MappedGraph {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Failed to open graph file {:?}", path))?;
        // Safety: the file is written once by `freeze` and never mutated
        // afterwards.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to map graph file {:?}", path))?;

        ensure!(
            mmap.len() >= HEADER_BYTES,
            "Graph file {:?} is too short for a header",
            path
        );

        let header: HeaderRecord = bytemuck::pod_read_unaligned(&mmap[..HEADER_BYTES]);
        ensure!(header.magic == MAGIC, "Graph file {:?} has a wrong magic", path);
        ensure!(
            header.version == VERSION,
            "Graph file {:?} has unsupported version {}",
            path,
            header.version
        );

        let num_nodes = header.num_nodes as usize;
        let num_arcs = header.num_arcs as usize;
        let expected = HEADER_BYTES + num_nodes * VERTEX_BYTES + num_arcs * ARC_BYTES;
        ensure!(
            mmap.len() == expected,
            "Graph file {:?} has {} bytes, expected {}",
            path,
            mmap.len(),
            expected
        );

        let mapped = MappedGraph {
            mmap,
            num_nodes,
            num_arcs,
        };
        mapped.validate(path)?;

        info!(
            "Mapped graph with {} nodes and {} arcs from {:?}",
            num_nodes, num_arcs, path
        );
        Ok(mapped)
    }

    /// Structural validation so that traversal never has to deal with
    /// dangling references.
    fn validate(&self, path: &Path) -> anyhow::Result<()> {
        let vertices = self.vertices();
        let mut expected_first = 0;
        for record in vertices {
            ensure!(
                record.first_arc as usize == expected_first,
                "Graph file {:?} has non-contiguous arc slices",
                path
            );
            expected_first += record.arc_count as usize;
        }
        ensure!(
            expected_first == self.num_arcs,
            "Graph file {:?} arc slices do not cover the arc array",
            path
        );

        for (idx, arc) in self.arcs().iter().enumerate() {
            ensure!(
                (arc.target as usize) < self.num_nodes,
                "Graph file {:?} arc {} targets nonexistent node",
                path,
                idx
            );
            ensure!(
                arc.weight >= 0.0,
                "Graph file {:?} arc {} has negative weight",
                path,
                idx
            );
            if arc.via != NO_INDEX {
                let via = NodeIndex::new(arc.via as usize);
                ensure!(
                    (arc.via as usize) < self.num_nodes,
                    "Graph file {:?} arc {} has nonexistent via vertex",
                    path,
                    idx
                );
                let owner = self.owner_of(idx);
                let from = if arc.flags & FLAG_FORWARD != 0 {
                    owner
                } else {
                    NodeIndex::new(arc.target as usize)
                };
                let to = if from == owner {
                    NodeIndex::new(arc.target as usize)
                } else {
                    owner
                };
                ensure!(
                    self.find_arc(via, from, false).is_some()
                        && self.find_arc(via, to, true).is_some(),
                    "Graph file {:?} shortcut arc {} cannot be unpacked",
                    path,
                    idx
                );
            }
        }
        Ok(())
    }

    fn vertices(&self) -> &[VertexRecord] {
        let start = HEADER_BYTES;
        let end = start + self.num_nodes * VERTEX_BYTES;
        bytemuck::cast_slice(&self.mmap[start..end])
    }

    fn arcs(&self) -> &[ArcRecord] {
        let start = HEADER_BYTES + self.num_nodes * VERTEX_BYTES;
        bytemuck::cast_slice(&self.mmap[start..])
    }

    pub fn num_arcs(&self) -> usize {
        self.num_arcs
    }

    /// Position of a vertex as stored in the file.
    pub fn coords(&self, node: NodeIndex) -> (f64, f64) {
        let record = &self.vertices()[node.index()];
        (record.lat as f64, record.lon as f64)
    }

    fn arc_range(&self, node: NodeIndex) -> Range<usize> {
        let record = &self.vertices()[node.index()];
        let first = record.first_arc as usize;
        first..first + record.arc_count as usize
    }

    /// The vertex owning the arc slice that `arc_idx` belongs to.
    fn owner_of(&self, arc_idx: usize) -> NodeIndex {
        let vertices = self.vertices();
        let idx = vertices.partition_point(|record| record.first_arc as usize <= arc_idx) - 1;
        NodeIndex::new(idx)
    }

    /// The cheapest arc of `owner` to `other`, traversable owner->other
    /// (`forward`) or other->owner.
    fn find_arc(&self, owner: NodeIndex, other: NodeIndex, forward: bool) -> Option<usize> {
        let arcs = self.arcs();
        let mut best: Option<usize> = None;
        for idx in self.arc_range(owner) {
            let arc = &arcs[idx];
            if arc.target as usize != other.index() {
                continue;
            }
            let traversable = if forward {
                arc.flags & FLAG_FORWARD != 0
            } else {
                arc.flags & FLAG_BACKWARD != 0
            };
            if traversable && best.map_or(true, |b| arc.weight < arcs[b].weight) {
                best = Some(idx);
            }
        }
        best
    }

    /// Appends the original arcs of `arc_idx`, traversed starting at
    /// `from`, to `out`.
    fn expand_directed(&self, arc_idx: usize, from: NodeIndex, out: &mut Vec<EdgeIndex>) {
        let arc = self.arcs()[arc_idx];
        if arc.via == NO_INDEX {
            out.push(EdgeIndex::new(arc_idx));
            return;
        }

        let via = NodeIndex::new(arc.via as usize);
        let owner = self.owner_of(arc_idx);
        let to = if owner == from {
            NodeIndex::new(arc.target as usize)
        } else {
            owner
        };

        let first = self
            .find_arc(via, from, false)
            .expect("Validated shortcut lost its first half");
        let second = self
            .find_arc(via, to, true)
            .expect("Validated shortcut lost its second half");

        self.expand_directed(first, from, out);
        self.expand_directed(second, via, out);
    }
}

impl HierarchyGraph for MappedGraph {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn links_fwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_ {
        let arcs = self.arcs();
        self.arc_range(node).filter_map(move |idx| {
            let arc = &arcs[idx];
            (arc.flags & FLAG_FORWARD != 0).then(|| Link {
                edge: EdgeIndex::new(idx),
                node: NodeIndex::new(arc.target as usize),
                weight: arc.weight as Weight,
            })
        })
    }

    fn links_bwd(&self, node: NodeIndex) -> impl Iterator<Item = Link> + '_ {
        let arcs = self.arcs();
        self.arc_range(node).filter_map(move |idx| {
            let arc = &arcs[idx];
            (arc.flags & FLAG_BACKWARD != 0).then(|| Link {
                edge: EdgeIndex::new(idx),
                node: NodeIndex::new(arc.target as usize),
                weight: arc.weight as Weight,
            })
        })
    }

    fn edge_weight(&self, edge_idx: EdgeIndex) -> Weight {
        self.arcs()[edge_idx.index()].weight as Weight
    }

    fn edge_endpoints(&self, edge_idx: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let arc = &self.arcs()[edge_idx.index()];
        (
            self.owner_of(edge_idx.index()),
            NodeIndex::new(arc.target as usize),
        )
    }

    fn expand_edge(&self, edge_idx: EdgeIndex, out: &mut Vec<EdgeIndex>) {
        let arc = &self.arcs()[edge_idx.index()];
        let from = if arc.flags & FLAG_FORWARD != 0 {
            self.owner_of(edge_idx.index())
        } else {
            NodeIndex::new(arc.target as usize)
        };
        self.expand_directed(edge_idx.index(), from, out);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_abs_diff_eq;

    use crate::{
        graph::node_index,
        node_contraction::NodeContractor,
        search::ch_search::CHSearch,
        util::test_graphs::{generate_complex_graph, generate_line_graph},
    };

    use super::*;

    fn frozen_complex_graph(dir: &tempfile::TempDir) -> (OverlayGraph, MappedGraph) {
        let mut g = generate_complex_graph();
        let mut contractor = NodeContractor::new(&mut g);
        let overlay = contractor.run();

        let path = dir.path().join("graph.ch");
        freeze(&overlay, &path).unwrap();
        let mapped = MappedGraph::open(&path).unwrap();
        (overlay, mapped)
    }

    #[test]
    fn freeze_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (overlay, mapped) = frozen_complex_graph(&dir);

        assert_eq!(mapped.num_nodes(), overlay.num_nodes());
        assert_eq!(
            mapped.num_arcs(),
            overlay.road_graph().edges.len()
        );

        let (lat, lon) = mapped.coords(node_index(0));
        assert_abs_diff_eq!(lat, 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(lon, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn mapped_queries_match_overlay_queries() {
        let dir = tempfile::tempdir().unwrap();
        let (overlay, mapped) = frozen_complex_graph(&dir);

        let mut on_overlay = CHSearch::new(&overlay);
        let mut on_mapped = CHSearch::new(&mapped);

        for s in 0..overlay.num_nodes() {
            for t in 0..overlay.num_nodes() {
                let a = on_overlay.search(node_index(s), node_index(t));
                let b = on_mapped.search(node_index(s), node_index(t));

                match (a, b) {
                    (Some(a), Some(b)) => {
                        // Arc weights are stored as f32; equally cheap
                        // routes may differ, endpoints may not.
                        assert_abs_diff_eq!(a.weight, b.weight, epsilon = 1e-3);
                        assert_eq!(a.nodes.first(), b.nodes.first());
                        assert_eq!(a.nodes.last(), b.nodes.last());
                    }
                    (None, None) => {}
                    (a, b) => panic!("Overlay {:?} and mapped {:?} disagree for {s}->{t}", a, b),
                }
            }
        }
    }

    #[test]
    fn mapped_line_graph_unpacks_shortcuts() {
        let mut g = generate_line_graph();

        // B,C,D,A,E
        let node_order = vec![
            node_index(1),
            node_index(2),
            node_index(3),
            node_index(0),
            node_index(4),
        ];
        let mut contractor = NodeContractor::new(&mut g);
        let overlay = contractor.run_with_order(&node_order);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.ch");
        freeze(&overlay, &path).unwrap();
        let mapped = MappedGraph::open(&path).unwrap();

        let mut ch = CHSearch::new(&mapped);
        let sp = ch.search(node_index(0), node_index(4)).unwrap();

        assert_abs_diff_eq!(sp.weight, 10.0, epsilon = 1e-3);
        assert_eq!(
            sp.nodes,
            vec![
                node_index(0),
                node_index(1),
                node_index(2),
                node_index(3),
                node_index(4)
            ]
        );
    }

    #[test]
    fn concurrent_mapped_queries() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mapped) = frozen_complex_graph(&dir);

        let mut baseline = CHSearch::new(&mapped);
        let expected = baseline.search(node_index(1), node_index(6)).unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let shared = &mapped;
                    s.spawn(move || {
                        let mut ch = CHSearch::new(shared);
                        ch.search(node_index(1), node_index(6)).unwrap().weight
                    })
                })
                .collect();

            for handle in handles {
                assert_abs_diff_eq!(expected.weight, handle.join().unwrap(), epsilon = 1e-9);
            }
        });
    }

    #[test]
    fn rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.ch");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"NOTAGRPH00000000000000000000").unwrap();

        assert!(MappedGraph::open(&path).is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        let mut g = generate_line_graph();
        let mut contractor = NodeContractor::new(&mut g);
        let overlay = contractor.run();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.ch");
        freeze(&overlay, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();

        assert!(MappedGraph::open(&path).is_err());
    }
}
