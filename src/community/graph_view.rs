//! Read-only graph adapter.
//!
//! The algorithms never touch the caller's graph type directly. A
//! [`GraphView`] exposes node indices, entering edges and degrees; once per
//! round it is flattened into a [`Topology`] snapshot that the per-node
//! updates read from. Entering edges are incoming edges on a directed graph
//! and all incident edges on an undirected one.

use petgraph::graph::{Graph, IndexType, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, NodeIndexable};
use petgraph::{Direction, EdgeType};

/// Stable node index, also used as the self-originated community label.
pub type NodeId = usize;

/// Edge payloads that may carry a numeric weight.
pub trait EdgeWeight {
    /// The weight, or `None` when the edge has none.
    fn weight(&self) -> Option<f64>;
}

impl EdgeWeight for () {
    fn weight(&self) -> Option<f64> {
        None
    }
}

impl EdgeWeight for f64 {
    fn weight(&self) -> Option<f64> {
        Some(*self)
    }
}

impl EdgeWeight for f32 {
    fn weight(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl EdgeWeight for u32 {
    fn weight(&self) -> Option<f64> {
        Some(f64::from(*self))
    }
}

impl EdgeWeight for u64 {
    fn weight(&self) -> Option<f64> {
        Some(*self as f64)
    }
}

impl EdgeWeight for Option<f64> {
    fn weight(&self) -> Option<f64> {
        *self
    }
}

/// Minimal read access the algorithms need from a graph.
pub trait GraphView {
    /// Exclusive upper bound of node indices.
    fn node_bound(&self) -> usize;

    /// Indices of the nodes currently present.
    fn node_indices(&self) -> Vec<NodeId>;

    /// Whether `node` is currently present.
    fn contains_node(&self, node: NodeId) -> bool;

    /// Neighbors `node` reads from, with the weight of the connecting edge.
    fn entering(&self, node: NodeId) -> Vec<(NodeId, Option<f64>)>;

    /// Number of edges incident to `node` (in + out on directed graphs).
    fn degree(&self, node: NodeId) -> usize;
}

impl<N, E, Ty, Ix> GraphView for Graph<N, E, Ty, Ix>
where
    E: EdgeWeight,
    Ty: EdgeType,
    Ix: IndexType,
{
    fn node_bound(&self) -> usize {
        self.node_count()
    }

    fn node_indices(&self) -> Vec<NodeId> {
        Graph::node_indices(self).map(|n| n.index()).collect()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        node < self.node_count()
    }

    fn entering(&self, node: NodeId) -> Vec<(NodeId, Option<f64>)> {
        if !GraphView::contains_node(self, node) {
            return Vec::new();
        }
        let a = NodeIndex::<Ix>::new(node);
        self.edges_directed(a, Direction::Incoming)
            .filter_map(|e| {
                let other = if e.source() == a { e.target() } else { e.source() };
                (other != a).then(|| (other.index(), EdgeWeight::weight(e.weight())))
            })
            .collect()
    }

    fn degree(&self, node: NodeId) -> usize {
        if !GraphView::contains_node(self, node) {
            return 0;
        }
        let a = NodeIndex::<Ix>::new(node);
        if self.is_directed() {
            self.edges_directed(a, Direction::Outgoing).count()
                + self.edges_directed(a, Direction::Incoming).count()
        } else {
            self.edges(a).count()
        }
    }
}

impl<N, E, Ty, Ix> GraphView for StableGraph<N, E, Ty, Ix>
where
    E: EdgeWeight,
    Ty: EdgeType,
    Ix: IndexType,
{
    fn node_bound(&self) -> usize {
        NodeIndexable::node_bound(self)
    }

    fn node_indices(&self) -> Vec<NodeId> {
        StableGraph::node_indices(self).map(|n| n.index()).collect()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        StableGraph::contains_node(self, NodeIndex::<Ix>::new(node))
    }

    fn entering(&self, node: NodeId) -> Vec<(NodeId, Option<f64>)> {
        if !GraphView::contains_node(self, node) {
            return Vec::new();
        }
        let a = NodeIndex::<Ix>::new(node);
        self.edges_directed(a, Direction::Incoming)
            .filter_map(|e| {
                let other = if e.source() == a { e.target() } else { e.source() };
                (other != a).then(|| (other.index(), EdgeWeight::weight(e.weight())))
            })
            .collect()
    }

    fn degree(&self, node: NodeId) -> usize {
        if !GraphView::contains_node(self, node) {
            return 0;
        }
        let a = NodeIndex::<Ix>::new(node);
        if self.is_directed() {
            self.edges_directed(a, Direction::Outgoing).count()
                + self.edges_directed(a, Direction::Incoming).count()
        } else {
            self.edges(a).count()
        }
    }
}

/// Sanitized edge weight: missing, non-finite and negative values read as 0.
pub(crate) fn read_weight(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() && w > 0.0 => w,
        _ => 0.0,
    }
}

/// Per-round snapshot of the graph structure.
///
/// Entering lists are sorted by neighbor index and deduplicated (parallel
/// edges keep the heaviest weight); self-loops are dropped.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    entering: Vec<Vec<(NodeId, f64)>>,
    degree: Vec<usize>,
    present: Vec<bool>,
}

impl Topology {
    /// Snapshot a graph view.
    pub fn from_view<G: GraphView + ?Sized>(graph: &G) -> Self {
        let bound = graph.node_bound();
        let mut entering = vec![Vec::new(); bound];
        let mut degree = vec![0; bound];
        let mut present = vec![false; bound];

        for u in graph.node_indices() {
            if u >= bound {
                continue;
            }
            present[u] = true;
            degree[u] = graph.degree(u);

            let mut list: Vec<(NodeId, f64)> = graph
                .entering(u)
                .into_iter()
                .filter(|&(v, _)| v != u)
                .map(|(v, w)| (v, read_weight(w)))
                .collect();
            list.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.total_cmp(&a.1)));
            list.dedup_by_key(|(v, _)| *v);
            entering[u] = list;
        }

        Self {
            entering,
            degree,
            present,
        }
    }

    /// Exclusive upper bound of node indices in this snapshot.
    pub fn node_bound(&self) -> usize {
        self.present.len()
    }

    /// Whether `node` was present when the snapshot was taken.
    pub fn contains(&self, node: NodeId) -> bool {
        self.present.get(node).copied().unwrap_or(false)
    }

    /// Present nodes in ascending index order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter_map(|(u, &p)| p.then_some(u))
    }

    /// Entering neighbors of `node` with sanitized weights.
    pub fn entering(&self, node: NodeId) -> &[(NodeId, f64)] {
        self.entering.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Degree of `node` as reported by the graph.
    pub fn degree(&self, node: NodeId) -> usize {
        self.degree.get(node).copied().unwrap_or(0)
    }

    /// Whether an edge from `from` enters `to`.
    pub fn has_edge_from(&self, to: NodeId, from: NodeId) -> bool {
        self.entering(to)
            .binary_search_by_key(&from, |&(v, _)| v)
            .is_ok()
    }

    /// Weight of the edge from `from` into `to`, 0 when absent.
    pub fn weight_from(&self, to: NodeId, from: NodeId) -> f64 {
        let list = self.entering(to);
        match list.binary_search_by_key(&from, |&(v, _)| v) {
            Ok(i) => list[i].1,
            Err(_) => 0.0,
        }
    }
}
