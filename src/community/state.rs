//! Typed per-node state.

use super::graph_view::NodeId;

/// Break-mode bookkeeping. Present only while a node is in break mode.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakState {
    /// Remaining break rounds.
    pub countdown: u32,
    /// Community the node belonged to when the break started.
    pub broken_community: usize,
    /// Whether the rejoin decision has been made for this episode.
    pub done: bool,
}

/// Originator token bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OriginatorState {
    /// Holds the community token.
    pub is_originator: bool,
    /// Token arrived (or was created) this round and is not evaluated yet.
    pub new_originator: bool,
    /// Neighbor the token last arrived from.
    pub from: Option<NodeId>,
}

impl OriginatorState {
    /// A freshly created token.
    pub(crate) fn originated() -> Self {
        Self {
            is_originator: true,
            new_originator: true,
            from: None,
        }
    }

    pub(crate) fn received_from(from: NodeId) -> Self {
        Self {
            is_originator: true,
            new_originator: true,
            from: Some(from),
        }
    }
}

/// Lifecycle phase of the stability state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Regular SHARC assignment.
    Normal,
    /// Break entered, rejoin not decided yet.
    BreakPending,
    /// Rejoin decided, counting down.
    BreakActive,
}

/// Everything a node remembers between rounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeState {
    /// Community label, `None` before the first update.
    pub community: Option<usize>,
    /// Aggregate similarity supporting `community`.
    pub score: f64,
    /// Score at the start of the last round.
    pub old_score: f64,
    /// Rounds of uninterrupted membership, propagated from neighbors.
    pub freshness: u64,
    /// Consecutive rounds in which freshness did not grow.
    pub stalling: u64,
    /// Similarity cutoff for neighbors that may propagate freshness.
    pub edge_threshold: f64,
    /// Break-mode record.
    pub brk: Option<BreakState>,
    /// Token record.
    pub originator: OriginatorState,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            community: None,
            score: 0.0,
            old_score: 0.0,
            freshness: 0,
            stalling: 0,
            edge_threshold: 0.0,
            brk: None,
            originator: OriginatorState::default(),
        }
    }
}

impl NodeState {
    /// State of a node that just started its own community.
    pub fn self_originated(node: NodeId) -> Self {
        let mut state = Self::default();
        state.originate(node);
        state
    }

    /// Start a new community labeled with the node's own index.
    pub(crate) fn originate(&mut self, node: NodeId) {
        self.community = Some(node);
        self.score = 0.0;
        self.originator = OriginatorState::originated();
    }

    /// Current stability phase.
    pub fn phase(&self) -> Phase {
        match self.brk {
            None => Phase::Normal,
            Some(b) if !b.done => Phase::BreakPending,
            Some(_) => Phase::BreakActive,
        }
    }

    /// Whether this node holds the community token.
    pub fn is_originator(&self) -> bool {
        self.originator.is_originator
    }

    pub(crate) fn drop_token(&mut self) {
        self.originator.is_originator = false;
        self.originator.from = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_originated_node_owns_its_label_and_token() {
        let s = NodeState::self_originated(7);
        assert_eq!(s.community, Some(7));
        assert_eq!(s.score, 0.0);
        assert!(s.is_originator());
        assert!(s.originator.new_originator);
        assert_eq!(s.phase(), Phase::Normal);
    }

    #[test]
    fn phase_follows_break_record() {
        let mut s = NodeState::self_originated(0);
        s.brk = Some(BreakState {
            countdown: 3,
            broken_community: 0,
            done: false,
        });
        assert_eq!(s.phase(), Phase::BreakPending);
        s.brk = Some(BreakState {
            countdown: 2,
            broken_community: 0,
            done: true,
        });
        assert_eq!(s.phase(), Phase::BreakActive);
    }
}
