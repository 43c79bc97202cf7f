//! Local label scoring.
//!
//! A node adds up, per community, the similarity of every entering
//! neighbor carrying that label and picks the best-supported community.
//! Ties go to the lowest community id, so the choice never depends on map
//! iteration order and consumes no randomness.

use super::graph_view::{NodeId, Topology};
use super::state::NodeState;
use super::traits::SimilarityStrategy;
use std::collections::BTreeMap;

/// Label chosen for a node in one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    /// Winning community.
    pub community: usize,
    /// Aggregate score of the winning community.
    pub score: f64,
    /// Whether the neighbor-count fallback decided the label.
    pub fell_back: bool,
}

/// Aggregates neighbor labels into a proposal.
#[derive(Debug, Clone, Copy)]
pub struct LocalScorer {
    fallback: bool,
}

impl LocalScorer {
    /// `fallback` enables the SHARC rule: when the best similarity score is
    /// exactly 0, re-select on plain neighbor counts.
    pub fn new(fallback: bool) -> Self {
        Self { fallback }
    }

    /// Score every community heard by `node` and pick one.
    ///
    /// Returns `None` when no entering neighbor has a label yet, which is the
    /// self-origination trigger.
    pub fn propose(
        &self,
        topology: &Topology,
        states: &[NodeState],
        strategy: &dyn SimilarityStrategy,
        node: NodeId,
    ) -> Option<Proposal> {
        let scores = aggregate(topology, states, node, |v| {
            strategy.similarity(topology, node, v)
        });
        let (community, score) = select(&scores)?;

        if self.fallback && score == 0.0 {
            let counts = aggregate(topology, states, node, |_| 1.0);
            let (community, score) = select(&counts)?;
            return Some(Proposal {
                community,
                score,
                fell_back: true,
            });
        }

        Some(Proposal {
            community,
            score,
            fell_back: false,
        })
    }
}

/// Sum `weight(v)` per label over the labeled entering neighbors of `node`.
pub(crate) fn aggregate<F>(
    topology: &Topology,
    states: &[NodeState],
    node: NodeId,
    mut weight: F,
) -> BTreeMap<usize, f64>
where
    F: FnMut(NodeId) -> f64,
{
    let mut scores = BTreeMap::new();
    for &(v, _) in topology.entering(node) {
        if let Some(c) = states.get(v).and_then(|s| s.community) {
            *scores.entry(c).or_insert(0.0) += weight(v);
        }
    }
    scores
}

/// Highest score, lowest community id on ties.
pub(crate) fn select(scores: &BTreeMap<usize, f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (&c, &s) in scores {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((c, s)),
        }
    }
    best
}
