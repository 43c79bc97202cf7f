//! Originator token migration.
//!
//! Every community carries one token marking its representative. The holder
//! re-evaluates the token once per round, after its own label decision:
//!
//! - if the holder changed community, the token is handed to the neighbor
//!   still in the old community with the highest score, or dropped;
//! - otherwise the policy decides whether to keep it or pass it to a
//!   same-community neighbor.
//!
//! A token is evaluated from the round after it arrived: a holder that
//! receives it before its own update skips it once (`new_originator`). After all nodes updated, [`reconcile`] restores the
//! one-token-per-community invariant over connected same-label components.

use super::graph_view::{NodeId, Topology};
use super::state::{NodeState, OriginatorState};
use petgraph::unionfind::UnionFind;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use tracing::trace;

/// How a settled token moves inside an unchanged community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OriginatorPolicy {
    /// Pass to the best neighbor only if it scores strictly higher.
    #[default]
    HighestScore,
    /// Biased random walk towards higher scores, never straight back.
    RandomWalk,
}

impl OriginatorPolicy {
    /// Evaluate the token held by `node` after its label decision.
    ///
    /// `states` is the read buffer, `next` the node's new state. Returns the
    /// destination when the token leaves `node`; `next` is updated to no
    /// longer hold it.
    pub fn update(
        &self,
        topology: &Topology,
        states: &[NodeState],
        node: NodeId,
        previous: Option<usize>,
        next: &mut NodeState,
        rng: &mut dyn RngCore,
    ) -> Option<NodeId> {
        if !next.originator.is_originator || next.originator.new_originator {
            return None;
        }

        let destination = match previous {
            Some(old) if next.community != Some(old) => {
                let dest = hand_off(topology, states, node, old);
                next.drop_token();
                return dest;
            }
            _ => match self {
                OriginatorPolicy::HighestScore => next.community.and_then(|c| {
                    best_in_community(topology, states, node, c, next.score)
                }),
                OriginatorPolicy::RandomWalk => random_walk_step(topology, states, node, next, rng),
            },
        };

        if destination.is_some() {
            next.drop_token();
        }
        destination
    }
}

/// Successor for the token of `community` after `node` left it: the
/// highest-score neighbor still carrying that label.
pub(crate) fn hand_off(
    topology: &Topology,
    states: &[NodeState],
    node: NodeId,
    community: usize,
) -> Option<NodeId> {
    let dest = best_in_community(topology, states, node, community, f64::NEG_INFINITY);
    if dest.is_none() {
        trace!(node, community, "token dropped");
    }
    dest
}

/// Neighbor in `community` with the highest score strictly above `floor`,
/// lowest index on ties.
fn best_in_community(
    topology: &Topology,
    states: &[NodeState],
    node: NodeId,
    community: usize,
    floor: f64,
) -> Option<NodeId> {
    let mut best: Option<(NodeId, f64)> = None;
    for &(v, _) in topology.entering(node) {
        let Some(s) = states.get(v) else { continue };
        if s.community != Some(community) || s.score <= floor {
            continue;
        }
        match best {
            Some((_, b)) if s.score <= b => {}
            _ => best = Some((v, s.score)),
        }
    }
    best.map(|(v, _)| v)
}

fn random_walk_step(
    topology: &Topology,
    states: &[NodeState],
    node: NodeId,
    next: &NodeState,
    rng: &mut dyn RngCore,
) -> Option<NodeId> {
    let community = next.community?;
    let came_from = next.originator.from;
    let candidates: Vec<(NodeId, f64)> = topology
        .entering(node)
        .iter()
        .filter(|&&(v, _)| Some(v) != came_from)
        .filter_map(|&(v, _)| {
            let s = states.get(v)?;
            (s.community == Some(community)).then_some((v, s.score.max(0.0)))
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let own = next.score;
    let max = candidates.iter().map(|&(_, s)| s).fold(f64::NEG_INFINITY, f64::max);
    let pass = max > own || {
        let p = if own > 0.0 { max / own } else { 0.0 };
        rng.random::<f64>() < p
    };
    if !pass {
        return None;
    }

    let total: f64 = candidates.iter().map(|&(_, s)| s).sum();
    if total <= 0.0 {
        return Some(candidates[rng.random_range(0..candidates.len())].0);
    }
    let mut r = rng.random::<f64>() * total;
    for &(v, s) in &candidates {
        if r < s {
            return Some(v);
        }
        r -= s;
    }
    candidates.iter().rev().find(|&&(_, s)| s > 0.0).map(|&(v, _)| v)
}

/// Hand a token from `from` to `to`.
///
/// `updated` tells whether `to` already ran its update this round. Its
/// token is then evaluated next round, so the `new_originator` marker is
/// left unset.
pub(crate) fn receive_token(states: &mut [NodeState], from: NodeId, to: NodeId, updated: bool) {
    if let Some(s) = states.get_mut(to) {
        if s.community.is_some() {
            trace!(from, to, updated, "token transferred");
            s.originator = OriginatorState::received_from(from);
            s.originator.new_originator = !updated;
        }
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Repairs {
    /// Components that had no token and got one.
    pub elected: usize,
    /// Surplus tokens removed.
    pub demoted: usize,
}

/// Leave exactly one token in every connected same-community component.
///
/// A component without a token elects its highest-score member; a component
/// with several keeps the highest-score holder. Ties go to the lowest index.
pub fn reconcile(topology: &Topology, states: &mut [NodeState]) -> Repairs {
    let n = states.len();
    let mut components = UnionFind::<usize>::new(n);
    for u in topology.nodes().filter(|&u| u < n) {
        let Some(c) = states[u].community else { continue };
        for &(v, _) in topology.entering(u) {
            if v < n && states[v].community == Some(c) {
                let _ = components.union(u, v);
            }
        }
    }

    // root -> (best member, holders)
    let mut groups: BTreeMap<usize, (NodeId, Vec<NodeId>)> = BTreeMap::new();
    for u in topology.nodes().filter(|&u| u < n) {
        if states[u].community.is_none() {
            continue;
        }
        let root = components.find_mut(u);
        let entry = groups.entry(root).or_insert((u, Vec::new()));
        if states[u].score > states[entry.0].score {
            entry.0 = u;
        }
        if states[u].is_originator() {
            entry.1.push(u);
        }
    }

    let mut repairs = Repairs::default();
    for (best, holders) in groups.into_values() {
        match holders.len() {
            0 => {
                states[best].originator = OriginatorState {
                    is_originator: true,
                    new_originator: false,
                    from: None,
                };
                repairs.elected += 1;
            }
            1 => {}
            _ => {
                let mut keep = holders[0];
                for &h in &holders[1..] {
                    if states[h].score > states[keep].score {
                        keep = h;
                    }
                }
                for &h in &holders {
                    if h != keep {
                        states[h].drop_token();
                        states[h].originator.new_originator = false;
                        repairs.demoted += 1;
                    }
                }
            }
        }
    }
    repairs
}
