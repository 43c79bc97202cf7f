//! Similarity strategies.
//!
//! ## Neighborhood similarity
//!
//! Two adjacent nodes are similar when they hear the same neighbors:
//!
//! ```text
//! sim(a, b) = 1 - non_shared(a, b) / (deg(a) + deg(b))
//! ```
//!
//! where `non_shared` counts the entering neighbors of `a` that have no edge
//! into `b`, plus the entering neighbors of `b` that have no edge into `a`.
//! Note that `a` and `b` count as non-shared for each other, so two nodes
//! joined by a lone edge have similarity 0.
//!
//! ## Weighted variants
//!
//! In a mobile network, edge weight usually measures link stability (for
//! instance the number of rounds the link has existed). Two reshapings
//! discount weak links:
//!
//! - **CDF rank**: `sim^(1/cdf)` where `cdf` is the fraction of the node's
//!   entering links that are not heavier than this one. The strongest link
//!   keeps its raw similarity and weaker links are pushed towards 0.
//!   The forced-yes mode uses `sim^(1/cdf - 1)`, which trusts the strongest
//!   link fully (exponent 0).
//! - **Max weight**: `sim * w / max_w`. Cheaper, linear in the weight.

use super::graph_view::{NodeId, Topology};
use super::traits::SimilarityStrategy;

/// Plain neighborhood similarity of two nodes, in `[0, 1]`.
pub fn neighborhood_similarity(topology: &Topology, a: NodeId, b: NodeId) -> f64 {
    let degrees = topology.degree(a) + topology.degree(b);
    if degrees == 0 {
        return 0.0;
    }

    let from_a = topology
        .entering(a)
        .iter()
        .filter(|&&(v, _)| !topology.has_edge_from(b, v))
        .count();
    let from_b = topology
        .entering(b)
        .iter()
        .filter(|&&(v, _)| !topology.has_edge_from(a, v))
        .count();

    (1.0 - (from_a + from_b) as f64 / degrees as f64).clamp(0.0, 1.0)
}

/// Every labeled neighbor counts 1: the baseline epidemic rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountSimilarity;

impl SimilarityStrategy for CountSimilarity {
    fn similarity(&self, _topology: &Topology, _a: NodeId, _b: NodeId) -> f64 {
        1.0
    }

    fn name(&self) -> &'static str {
        "count"
    }
}

/// Unweighted SHARC similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborhoodSimilarity;

impl SimilarityStrategy for NeighborhoodSimilarity {
    fn similarity(&self, topology: &Topology, a: NodeId, b: NodeId) -> f64 {
        neighborhood_similarity(topology, a, b)
    }

    fn name(&self) -> &'static str {
        "neighborhood"
    }
}

/// Neighborhood similarity reshaped by the rank of the link weight.
#[derive(Debug, Clone, Default)]
pub struct CdfRankSimilarity {
    forced_yes: bool,
    /// Entering weights of the prepared node, heaviest first.
    descending: Vec<f64>,
}

impl CdfRankSimilarity {
    /// Create the strategy; `forced_yes` selects the `1/cdf - 1` exponent.
    pub fn new(forced_yes: bool) -> Self {
        Self {
            forced_yes,
            descending: Vec::new(),
        }
    }

    /// Fraction of the prepared node's links that are not heavier than `weight`.
    ///
    /// Returns 1 for a node without links.
    pub fn cdf(&self, weight: f64) -> f64 {
        let count = self.descending.len();
        if count == 0 {
            return 1.0;
        }
        let heavier = self.descending.iter().take_while(|&&w| w > weight).count();
        (count - heavier) as f64 / count as f64
    }
}

impl SimilarityStrategy for CdfRankSimilarity {
    fn prepare(&mut self, topology: &Topology, node: NodeId) {
        self.descending.clear();
        self.descending
            .extend(topology.entering(node).iter().map(|&(_, w)| w));

        let max = self.descending.iter().copied().fold(0.0, f64::max);
        if max == 0.0 && self.forced_yes {
            self.descending.clear();
            self.descending.extend([1.0, 0.0]);
        }
        self.descending.sort_by(|x, y| y.total_cmp(x));
    }

    fn similarity(&self, topology: &Topology, a: NodeId, b: NodeId) -> f64 {
        let sim = neighborhood_similarity(topology, a, b);
        let cdf = self.cdf(topology.weight_from(a, b));
        if cdf <= 0.0 {
            return 0.0;
        }
        let exponent = if self.forced_yes {
            1.0 / cdf - 1.0
        } else {
            1.0 / cdf
        };
        sim.powf(exponent).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.descending = Vec::new();
    }

    fn name(&self) -> &'static str {
        if self.forced_yes {
            "cdf-rank-forced-yes"
        } else {
            "cdf-rank"
        }
    }
}

/// Neighborhood similarity scaled by `weight / max_weight`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxWeightSimilarity {
    max_weight: f64,
}

impl SimilarityStrategy for MaxWeightSimilarity {
    fn prepare(&mut self, topology: &Topology, node: NodeId) {
        self.max_weight = topology
            .entering(node)
            .iter()
            .map(|&(_, w)| w)
            .fold(0.0, f64::max);
    }

    fn similarity(&self, topology: &Topology, a: NodeId, b: NodeId) -> f64 {
        let sim = neighborhood_similarity(topology, a, b);
        if self.max_weight <= 0.0 {
            return sim;
        }
        (sim * topology.weight_from(a, b) / self.max_weight).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.max_weight = 0.0;
    }

    fn name(&self) -> &'static str {
        "max-weight"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use petgraph::graph::{NodeIndex, UnGraph};
    use proptest::prelude::*;

    fn clique(n: usize, weight: f64) -> UnGraph<(), f64> {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let _ = graph.add_edge(nodes[i], nodes[j], weight);
            }
        }
        graph
    }

    /// Node 0 linked to `weights.len()` leaves; leaves 1 and 2 also linked.
    fn fan(weights: &[f64]) -> UnGraph<(), f64> {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        let hub = graph.add_node(());
        let leaves: Vec<_> = weights.iter().map(|_| graph.add_node(())).collect();
        for (leaf, &w) in leaves.iter().zip(weights) {
            let _ = graph.add_edge(hub, *leaf, w);
        }
        if leaves.len() >= 2 {
            let _ = graph.add_edge(leaves[0], leaves[1], 1.0);
        }
        graph
    }

    #[test]
    fn clique_similarity_is_two_thirds() {
        let topo = Topology::from_view(&clique(4, 1.0));
        let sim = neighborhood_similarity(&topo, 0, 1);
        assert!((sim - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn lone_edge_has_zero_similarity() {
        let mut graph = UnGraph::<(), ()>::new_undirected();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let _ = graph.add_edge(a, b, ());
        let topo = Topology::from_view(&graph);
        assert_eq!(neighborhood_similarity(&topo, 0, 1), 0.0);
    }

    #[test]
    fn isolated_pair_has_zero_similarity() {
        let mut graph = UnGraph::<(), ()>::new_undirected();
        let _ = graph.add_node(());
        let _ = graph.add_node(());
        let topo = Topology::from_view(&graph);
        assert_eq!(neighborhood_similarity(&topo, 0, 1), 0.0);
    }

    #[test]
    fn cdf_ranks_links_heaviest_first() {
        let topo = Topology::from_view(&fan(&[4.0, 2.0, 2.0, 1.0]));
        let mut strategy = CdfRankSimilarity::new(false);
        strategy.prepare(&topo, 0);
        assert_eq!(strategy.cdf(4.0), 1.0);
        assert_eq!(strategy.cdf(2.0), 0.75);
        assert_eq!(strategy.cdf(1.0), 0.25);
    }

    #[test]
    fn cdf_strongest_link_keeps_raw_similarity() {
        let topo = Topology::from_view(&fan(&[4.0, 1.0, 1.0]));
        let mut strategy = CdfRankSimilarity::new(false);
        strategy.prepare(&topo, 0);
        let raw = neighborhood_similarity(&topo, 0, 1);
        assert!(raw > 0.0);
        assert!((strategy.similarity(&topo, 0, 1) - raw).abs() < 1e-12);
        // Leaf 2 is tied with leaf 3 at the bottom: cdf = 2/3.
        let raw2 = neighborhood_similarity(&topo, 0, 2);
        let expected = raw2.powf(1.5);
        assert!((strategy.similarity(&topo, 0, 2) - expected).abs() < 1e-12);
    }

    #[test]
    fn forced_yes_trusts_strongest_link_fully() {
        let topo = Topology::from_view(&fan(&[4.0, 1.0, 1.0]));
        let mut strategy = CdfRankSimilarity::new(true);
        strategy.prepare(&topo, 0);
        assert_eq!(strategy.similarity(&topo, 0, 1), 1.0);
    }

    #[test]
    fn forced_yes_without_weights_is_unweighted() {
        let topo = Topology::from_view(&fan(&[0.0, 0.0, 0.0]));
        let mut strategy = CdfRankSimilarity::new(true);
        strategy.prepare(&topo, 0);
        let raw = neighborhood_similarity(&topo, 0, 1);
        assert!((strategy.similarity(&topo, 0, 1) - raw).abs() < 1e-12);
    }

    #[test]
    fn max_weight_scales_linearly() {
        let topo = Topology::from_view(&fan(&[4.0, 2.0, 1.0]));
        let mut strategy = MaxWeightSimilarity::default();
        strategy.prepare(&topo, 0);
        let raw = neighborhood_similarity(&topo, 0, 2);
        assert!((strategy.similarity(&topo, 0, 2) - raw * 0.5).abs() < 1e-12);
    }

    #[test]
    fn max_weight_without_weights_is_unweighted() {
        let mut graph = UnGraph::<(), ()>::new_undirected();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let _ = graph.add_edge(a, b, ());
        let _ = graph.add_edge(b, c, ());
        let _ = graph.add_edge(a, c, ());
        let topo = Topology::from_view(&graph);
        let mut strategy = MaxWeightSimilarity::default();
        strategy.prepare(&topo, 0);
        assert_eq!(
            strategy.similarity(&topo, 0, 1),
            neighborhood_similarity(&topo, 0, 1)
        );
    }

    fn random_graph(n: usize, edges: &[(usize, usize, f64)]) -> UnGraph<(), f64> {
        let mut graph = UnGraph::<(), f64>::new_undirected();
        for _ in 0..n {
            let _ = graph.add_node(());
        }
        for &(i, j, w) in edges {
            let (i, j) = (i % n, j % n);
            if i != j {
                let _ = graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), w);
            }
        }
        graph
    }

    proptest! {
        #[test]
        fn similarity_stays_in_unit_interval(
            n in 2usize..12,
            edges in proptest::collection::vec((0usize..12, 0usize..12, 0.0f64..10.0), 0..40),
        ) {
            let graph = random_graph(n, &edges);
            let topo = Topology::from_view(&graph);
            let mut strategies: Vec<Box<dyn SimilarityStrategy>> = vec![
                Box::new(NeighborhoodSimilarity),
                Box::new(CdfRankSimilarity::new(false)),
                Box::new(CdfRankSimilarity::new(true)),
                Box::new(MaxWeightSimilarity::default()),
            ];
            for a in 0..n {
                for strategy in strategies.iter_mut() {
                    strategy.prepare(&topo, a);
                    for &(b, _) in topo.entering(a) {
                        let s = strategy.similarity(&topo, a, b);
                        prop_assert!((0.0..=1.0).contains(&s), "{} gave {}", strategy.name(), s);
                    }
                }
            }
        }

        #[test]
        fn cdf_similarity_is_monotone_in_weight(
            others in proptest::collection::vec(0.0f64..10.0, 1..6),
            low in 0.0f64..10.0,
            bump in 0.0f64..10.0,
            forced_yes in any::<bool>(),
        ) {
            let mut weights = vec![low];
            weights.extend(others.iter().copied());
            let before = Topology::from_view(&fan(&weights));
            weights[0] = low + bump;
            let after = Topology::from_view(&fan(&weights));

            let mut strategy = CdfRankSimilarity::new(forced_yes);
            strategy.prepare(&before, 0);
            let s_before = strategy.similarity(&before, 0, 1);
            strategy.prepare(&after, 0);
            let s_after = strategy.similarity(&after, 0, 1);
            prop_assert!(s_after + 1e-12 >= s_before, "{} -> {}", s_before, s_after);
        }
    }
}
