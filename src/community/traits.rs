//! Community detection traits.

use super::graph_view::{NodeId, Topology};
use crate::error::Result;
use petgraph::graph::UnGraph;
use std::fmt;

/// Trait for community detection algorithms.
pub trait CommunityDetection {
    /// Detect communities in a graph.
    ///
    /// Returns a mapping from node index to community ID.
    fn detect<N, E>(&self, graph: &UnGraph<N, E>) -> Result<Vec<usize>>
    where
        E: super::graph_view::EdgeWeight;
}

/// Pairwise affinity in `[0, 1]` between a node and one of its neighbors.
///
/// `prepare` is called once per node per round before any `similarity`
/// call for that node; implementations may cache per-node data there (for
/// example the sorted weight list of the node's entering edges). `a` is
/// always the prepared node.
pub trait SimilarityStrategy: fmt::Debug {
    /// Rebuild per-node scratch for `node`.
    fn prepare(&mut self, _topology: &Topology, _node: NodeId) {}

    /// Affinity between the prepared node `a` and its neighbor `b`.
    fn similarity(&self, topology: &Topology, a: NodeId, b: NodeId) -> f64;

    /// Release per-run scratch.
    fn reset(&mut self) {}

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
