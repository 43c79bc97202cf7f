//! Freshness, stalling and break mode.
//!
//! ## Freshness
//!
//! The token holder of a community increments its freshness every round it
//! keeps its label. Other members copy the highest freshness they hear from
//! same-community neighbors, so in a healthy community the counter keeps
//! growing everywhere. Only neighbors whose similarity clears the node's
//! adaptive edge threshold (`mean - 0.5 * stdev` of the similarities to
//! same-community neighbors) are listened to; weak links do not carry the
//! signal.
//!
//! ## Stalling and break mode
//!
//! A node whose freshness stops growing for `stalling_threshold` rounds is
//! stuck in a community it cannot hear the representative of. It breaks
//! away:
//!
//! ```text
//!            stalling >= threshold
//!   Normal ─────────────────────────▶ BreakPending
//!      ▲                                  │ rejoin: a done neighbor of the
//!      │ countdown == 0                   │ same broken community, else
//!      │                                  ▼ self-originate
//!      └──────────────────────────── BreakActive (countdown)
//! ```
//!
//! A node entering break in round `t` leaves it during round
//! `t + break_period`. While in break it keeps its label; the regular SHARC
//! assignment resumes afterwards.

use super::graph_view::{NodeId, Topology};
use super::state::{BreakState, NodeState};
use super::traits::SimilarityStrategy;
use tracing::trace;

/// Per-node stability state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityController {
    stalling_threshold: u32,
    break_period: u32,
}

impl StabilityController {
    /// Create a controller. Both parameters are at least 1 (checked by
    /// [`SharcConfig::validate`](super::SharcConfig::validate)).
    pub fn new(stalling_threshold: u32, break_period: u32) -> Self {
        debug_assert!(stalling_threshold >= 1 && break_period >= 1);
        Self {
            stalling_threshold,
            break_period,
        }
    }

    /// Stalled rounds before a break.
    pub fn stalling_threshold(&self) -> u32 {
        self.stalling_threshold
    }

    /// Break length in rounds.
    pub fn break_period(&self) -> u32 {
        self.break_period
    }

    /// Run one break-mode round for a node with a break record.
    ///
    /// The first round makes the rejoin decision: adopt the community of
    /// the highest-score neighbor that already rejoined after breaking from
    /// the same community, or self-originate when there is none (or when
    /// the node is `isolated`). Every round then advances the countdown and
    /// leaves break mode once it is exhausted.
    pub fn break_round(
        &self,
        topology: &Topology,
        states: &[NodeState],
        node: NodeId,
        next: &mut NodeState,
        isolated: bool,
    ) {
        let Some(mut brk) = next.brk else {
            return;
        };

        if !brk.done {
            let partner = if isolated {
                None
            } else {
                rejoin_partner(topology, states, node, brk.broken_community)
            };
            match partner {
                Some(community) => {
                    trace!(node, community, "rejoining after break");
                    next.community = Some(community);
                }
                None => {
                    trace!(node, "self-originating after break");
                    next.originate(node);
                }
            }
            brk.done = true;
        } else if isolated {
            next.originate(node);
        }

        if brk.countdown > 0 {
            brk.countdown -= 1;
            next.brk = Some(brk);
        } else {
            trace!(node, "leaving break mode");
            next.brk = None;
        }
    }

    /// Update freshness and stalling after the label decision.
    pub fn update_freshness(
        &self,
        topology: &Topology,
        states: &[NodeState],
        strategy: &dyn SimilarityStrategy,
        node: NodeId,
        previous: Option<usize>,
        next: &mut NodeState,
    ) {
        if previous.is_some() && previous != next.community {
            next.freshness = 0;
            next.stalling = 0;
            return;
        }

        let before = next.freshness;
        let threshold = edge_threshold(topology, states, strategy, node, next.community);
        next.edge_threshold = threshold;

        let mut freshness = before;
        for &(v, _) in topology.entering(node) {
            let Some(s) = states.get(v) else { continue };
            if s.community.is_none() || s.community != next.community {
                continue;
            }
            if s.freshness > freshness && strategy.similarity(topology, node, v) >= threshold {
                freshness = s.freshness;
            }
        }
        if next.is_originator() {
            freshness += 1;
        }
        next.freshness = freshness;

        if freshness > before {
            next.stalling = 0;
        } else {
            next.stalling += 1;
        }
    }

    /// Enter break mode when the node has stalled long enough.
    ///
    /// Returns whether a break started.
    pub fn enter_break_if_stalled(&self, node: NodeId, next: &mut NodeState) -> bool {
        if next.brk.is_some() || next.stalling < u64::from(self.stalling_threshold) {
            return false;
        }
        let broken_community = next.community.unwrap_or(node);
        trace!(node, broken_community, stalling = next.stalling, "entering break mode");
        next.brk = Some(BreakState {
            countdown: self.break_period - 1,
            broken_community,
            done: false,
        });
        true
    }
}

/// Highest-score neighbor that broke from `broken` and has already rejoined.
fn rejoin_partner(
    topology: &Topology,
    states: &[NodeState],
    node: NodeId,
    broken: usize,
) -> Option<usize> {
    let mut best: Option<(f64, usize)> = None;
    for &(v, _) in topology.entering(node) {
        let Some(s) = states.get(v) else { continue };
        let (Some(community), Some(b)) = (s.community, s.brk) else {
            continue;
        };
        if !b.done || b.broken_community != broken {
            continue;
        }
        match best {
            Some((score, _)) if s.score <= score => {}
            _ => best = Some((s.score, community)),
        }
    }
    best.map(|(_, community)| community)
}

/// `mean - 0.5 * stdev` of the similarities to same-community neighbors.
///
/// Uses the sample standard deviation; 0 when there are no such neighbors.
pub fn edge_threshold(
    topology: &Topology,
    states: &[NodeState],
    strategy: &dyn SimilarityStrategy,
    node: NodeId,
    community: Option<usize>,
) -> f64 {
    let Some(community) = community else {
        return 0.0;
    };
    let sims: Vec<f64> = topology
        .entering(node)
        .iter()
        .filter(|&&(v, _)| states.get(v).and_then(|s| s.community) == Some(community))
        .map(|&(v, _)| strategy.similarity(topology, node, v))
        .collect();

    let n = sims.len();
    if n == 0 {
        return 0.0;
    }
    let mean = sims.iter().sum::<f64>() / n as f64;
    let stdev = if n > 1 {
        let var = sims.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt()
    } else {
        0.0
    };
    // Rounding can lift the mean of equal values above them.
    let max = sims.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (mean - 0.5 * stdev).min(max)
}
