//! The SHARC round engine.
//!
//! [`Sharc`] owns the per-node state of one run and advances it one round
//! per [`compute`](Sharc::compute) call. A round walks every present node
//! in ascending index order and runs the same pipeline for each:
//!
//! 1. label decision: break-mode handling, self-origination for isolated or
//!    unlabeled nodes, otherwise the local scorer;
//! 2. originator token evaluation;
//! 3. freshness, stalling and break entry (stability-aware variants only).
//!
//! After the pass, pending token transfers land and [`reconcile`] repairs
//! components that lost or duplicated their token.

use super::config::{Algorithm, Schedule, SharcConfig};
use super::dynamic::ChangeEvent;
use super::graph_view::{EdgeWeight, GraphView, NodeId, Topology};
use super::originator::{hand_off, receive_token, reconcile, OriginatorPolicy, Repairs};
use super::scorer::LocalScorer;
use super::similarity::{
    CdfRankSimilarity, CountSimilarity, MaxWeightSimilarity, NeighborhoodSimilarity,
};
use super::stability::StabilityController;
use super::state::NodeState;
use super::traits::{CommunityDetection, SimilarityStrategy};
use crate::error::{Error, Result};
use petgraph::graph::UnGraph;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// The composition selected by an [`Algorithm`].
#[derive(Debug)]
struct Rules {
    similarity: Box<dyn SimilarityStrategy>,
    scorer: LocalScorer,
    stability: Option<StabilityController>,
    policy: OriginatorPolicy,
}

/// New state of one node plus the token transfer it requested.
struct NodeUpdate {
    state: NodeState,
    transfer: Option<NodeId>,
}

impl Rules {
    fn for_config(config: &SharcConfig) -> Self {
        let similarity: Box<dyn SimilarityStrategy> = match config.algorithm {
            Algorithm::Baseline => Box::new(CountSimilarity),
            Algorithm::Sharc => Box::new(NeighborhoodSimilarity),
            Algorithm::CdfWeighted => Box::new(CdfRankSimilarity::new(config.forced_yes)),
            Algorithm::MaxWeighted | Algorithm::StabilityAware | Algorithm::TokenRandomWalk => {
                Box::new(MaxWeightSimilarity::default())
            }
        };
        let stability = config
            .algorithm
            .has_stability()
            .then(|| StabilityController::new(config.stalling_threshold, config.break_period));
        let policy = match config.algorithm {
            Algorithm::TokenRandomWalk => OriginatorPolicy::RandomWalk,
            _ => OriginatorPolicy::HighestScore,
        };

        Self {
            similarity,
            scorer: LocalScorer::new(config.algorithm != Algorithm::Baseline),
            stability,
            policy,
        }
    }

    fn update_node(
        &mut self,
        topology: &Topology,
        read: &[NodeState],
        node: NodeId,
        rng: &mut dyn RngCore,
    ) -> NodeUpdate {
        let prev = read.get(node).cloned().unwrap_or_default();
        let previous = prev.community;
        let mut next = prev.clone();
        next.old_score = prev.score;

        self.similarity.prepare(topology, node);
        let similarity = &*self.similarity;
        let isolated = topology.degree(node) == 0 || previous.is_none();

        match &self.stability {
            Some(ctl) if next.brk.is_some() => {
                ctl.break_round(topology, read, node, &mut next, isolated);
            }
            _ if isolated => next.originate(node),
            _ => match self.scorer.propose(topology, read, similarity, node) {
                Some(p) => {
                    if p.fell_back {
                        trace!(node, community = p.community, "neighbor-count fallback");
                    }
                    next.community = Some(p.community);
                    next.score = p.score;
                }
                None => next.originate(node),
            },
        }

        let mut transfer = self
            .policy
            .update(topology, read, node, previous, &mut next, rng);

        // A node that started a new community this round still owes the
        // token of the community it left.
        let settled = prev.originator.is_originator && !prev.originator.new_originator;
        if transfer.is_none() && settled && next.originator.new_originator {
            if let Some(old) = previous.filter(|&c| Some(c) != next.community) {
                transfer = hand_off(topology, read, node, old);
            }
        }

        if let Some(ctl) = &self.stability {
            ctl.update_freshness(topology, read, similarity, node, previous, &mut next);
            let _ = ctl.enter_break_if_stalled(node, &mut next);
        }

        next.originator.new_originator = false;
        NodeUpdate {
            state: next,
            transfer,
        }
    }
}

/// One run of a SHARC-family algorithm over a (possibly changing) graph.
///
/// # Example
///
/// ```
/// use petgraph::graph::UnGraph;
/// use sharc::community::{Algorithm, Sharc, SharcConfig};
///
/// let mut graph = UnGraph::<(), ()>::new_undirected();
/// let n: Vec<_> = (0..4).map(|_| graph.add_node(())).collect();
/// for i in 0..4 {
///     for j in (i + 1)..4 {
///         graph.add_edge(n[i], n[j], ());
///     }
/// }
///
/// let mut sharc = Sharc::new(SharcConfig::new(Algorithm::Sharc).with_seed(1)).unwrap();
/// sharc.init(&graph);
/// for _ in 0..5 {
///     sharc.compute(&graph);
/// }
/// assert_eq!(sharc.communities().len(), 1);
/// assert_eq!(sharc.originators().len(), 1);
/// ```
#[derive(Debug)]
pub struct Sharc {
    config: SharcConfig,
    rules: Rules,
    states: Vec<NodeState>,
    rng: StdRng,
    round: u64,
}

impl Sharc {
    /// Validate `config` and build the algorithm it selects.
    pub fn new(config: SharcConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::random()),
        };
        Ok(Self {
            rules: Rules::for_config(&config),
            config,
            states: Vec::new(),
            rng,
            round: 0,
        })
    }

    /// Start a run: every present node self-originates.
    pub fn init<G: GraphView + ?Sized>(&mut self, graph: &G) {
        self.states = (0..graph.node_bound())
            .map(|u| {
                if graph.contains_node(u) {
                    NodeState::self_originated(u)
                } else {
                    NodeState::default()
                }
            })
            .collect();
        self.round = 0;
        self.rules.similarity.reset();
        debug!(
            algorithm = %self.config.algorithm,
            nodes = graph.node_indices().len(),
            "initialized"
        );
    }

    /// Apply a change notification.
    ///
    /// Added nodes self-originate; removed nodes lose their state. Edge
    /// changes need no bookkeeping here because every round reads the
    /// graph afresh.
    pub fn handle(&mut self, event: &ChangeEvent) {
        match *event {
            ChangeEvent::NodeAdded(u) => {
                if self.states.len() <= u {
                    self.states.resize_with(u + 1, NodeState::default);
                }
                self.states[u] = NodeState::self_originated(u);
            }
            ChangeEvent::NodeRemoved(u) => {
                if let Some(s) = self.states.get_mut(u) {
                    *s = NodeState::default();
                }
            }
            ChangeEvent::EdgeAdded { from, to } | ChangeEvent::EdgeRemoved { from, to } => {
                trace!(from, to, ?event, "edge change");
            }
            ChangeEvent::StepBegins(step) => trace!(step, "step begins"),
        }
    }

    /// Run one round using the internal generator.
    pub fn compute<G: GraphView + ?Sized>(&mut self, graph: &G) {
        let topology = Topology::from_view(graph);
        let repairs = run_round(
            self.config.schedule,
            &mut self.rules,
            &mut self.states,
            &topology,
            &mut self.rng,
        );
        self.round += 1;
        log_round(self.round, &self.states, repairs);
    }

    /// Run one round drawing randomness from `rng`.
    pub fn compute_with_rng<G, R>(&mut self, graph: &G, rng: &mut R)
    where
        G: GraphView + ?Sized,
        R: RngCore,
    {
        let topology = Topology::from_view(graph);
        let repairs = run_round(
            self.config.schedule,
            &mut self.rules,
            &mut self.states,
            &topology,
            rng,
        );
        self.round += 1;
        log_round(self.round, &self.states, repairs);
    }

    /// End the run and drop per-run scratch. Node state stays readable.
    pub fn terminate(&mut self) {
        self.rules.similarity.reset();
        debug!(rounds = self.round, "terminated");
    }

    /// The configuration this run was built from.
    pub fn config(&self) -> &SharcConfig {
        &self.config
    }

    /// Rounds computed since [`init`](Self::init).
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Community of `node`.
    pub fn community(&self, node: NodeId) -> Option<usize> {
        self.states.get(node).and_then(|s| s.community)
    }

    /// Score supporting the community of `node`.
    pub fn score(&self, node: NodeId) -> Option<f64> {
        self.state(node).map(|s| s.score)
    }

    /// Freshness of `node`.
    pub fn freshness(&self, node: NodeId) -> Option<u64> {
        self.state(node).map(|s| s.freshness)
    }

    /// Full state of a labeled node.
    pub fn state(&self, node: NodeId) -> Option<&NodeState> {
        self.states.get(node).filter(|s| s.community.is_some())
    }

    /// Dense state array indexed by node.
    pub fn states(&self) -> &[NodeState] {
        &self.states
    }

    /// Label of every node index, `None` for unknown nodes.
    pub fn labels(&self) -> Vec<Option<usize>> {
        self.states.iter().map(|s| s.community).collect()
    }

    /// Members of every community, keyed by label.
    pub fn communities(&self) -> BTreeMap<usize, Vec<NodeId>> {
        let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (u, s) in self.states.iter().enumerate() {
            if let Some(c) = s.community {
                groups.entry(c).or_default().push(u);
            }
        }
        groups
    }

    /// Nodes currently holding a community token.
    pub fn originators(&self) -> Vec<NodeId> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.community.is_some() && s.is_originator())
            .map(|(u, _)| u)
            .collect()
    }
}

fn run_round(
    schedule: Schedule,
    rules: &mut Rules,
    states: &mut Vec<NodeState>,
    topology: &Topology,
    rng: &mut dyn RngCore,
) -> Repairs {
    sync_nodes(states, topology);

    match schedule {
        Schedule::Synchronous => {
            let committed = states.clone();
            let mut transfers = Vec::new();
            for node in topology.nodes() {
                let update = rules.update_node(topology, &committed, node, rng);
                states[node] = update.state;
                if let Some(to) = update.transfer {
                    transfers.push((node, to));
                }
            }
            // Every receiver has already run this round.
            for (from, to) in transfers {
                receive_token(states, from, to, true);
            }
        }
        Schedule::Sequential => {
            for node in topology.nodes() {
                let update = rules.update_node(topology, states, node, rng);
                states[node] = update.state;
                if let Some(to) = update.transfer {
                    receive_token(states, node, to, to < node);
                }
            }
        }
    }

    reconcile(topology, states)
}

/// Size the state array to the graph and forget nodes that disappeared.
fn sync_nodes(states: &mut Vec<NodeState>, topology: &Topology) {
    if states.len() < topology.node_bound() {
        states.resize_with(topology.node_bound(), NodeState::default);
    }
    for (u, s) in states.iter_mut().enumerate() {
        if s.community.is_some() && !topology.contains(u) {
            *s = NodeState::default();
        }
    }
}

fn log_round(round: u64, states: &[NodeState], repairs: Repairs) {
    let mut labels: Vec<usize> = states.iter().filter_map(|s| s.community).collect();
    labels.sort_unstable();
    labels.dedup();
    let originators = states
        .iter()
        .filter(|s| s.community.is_some() && s.is_originator())
        .count();
    let in_break = states.iter().filter(|s| s.brk.is_some()).count();

    if repairs != Repairs::default() {
        debug!(
            round,
            elected = repairs.elected,
            demoted = repairs.demoted,
            "originator tokens repaired"
        );
    }
    debug!(
        round,
        communities = labels.len(),
        originators,
        in_break,
        "round complete"
    );
}

impl CommunityDetection for SharcConfig {
    fn detect<N, E>(&self, graph: &UnGraph<N, E>) -> Result<Vec<usize>>
    where
        E: EdgeWeight,
    {
        let n = graph.node_count();
        if n == 0 {
            return Err(Error::EmptyInput);
        }

        let mut sharc = Sharc::new(self.clone())?;
        sharc.init(graph);
        for _ in 0..self.max_rounds {
            sharc.compute(graph);
        }
        sharc.terminate();

        let labels: Vec<usize> = (0..n).map(|u| sharc.community(u).unwrap_or(u)).collect();

        // Renumber to consecutive integers
        let mut unique = labels.clone();
        unique.sort_unstable();
        unique.dedup();
        Ok(labels
            .iter()
            .map(|l| unique.binary_search(l).unwrap_or(0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::state::BreakState;

    fn clique(n: usize) -> UnGraph<(), ()> {
        let mut graph = UnGraph::<(), ()>::new_undirected();
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                let _ = graph.add_edge(nodes[i], nodes[j], ());
            }
        }
        graph
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = SharcConfig::default().with_break(5, 0);
        assert!(matches!(
            Sharc::new(config),
            Err(Error::InvalidParameter { name: "break_period", .. })
        ));
    }

    #[test]
    fn factory_composes_each_variant() {
        for algo in Algorithm::ALL {
            let rules = Rules::for_config(&SharcConfig::new(algo));
            assert_eq!(rules.stability.is_some(), algo.has_stability());
            let expected = if algo == Algorithm::TokenRandomWalk {
                OriginatorPolicy::RandomWalk
            } else {
                OriginatorPolicy::HighestScore
            };
            assert_eq!(rules.policy, expected);
        }
        let cdf = Rules::for_config(&SharcConfig::new(Algorithm::CdfWeighted).with_forced_yes(true));
        assert_eq!(cdf.similarity.name(), "cdf-rank-forced-yes");
        assert_eq!(
            Rules::for_config(&SharcConfig::new(Algorithm::Baseline)).similarity.name(),
            "count"
        );
    }

    #[test]
    fn init_self_originates_every_node() {
        let graph = clique(3);
        let mut sharc = Sharc::new(SharcConfig::default().with_seed(0)).unwrap();
        sharc.init(&graph);
        assert_eq!(sharc.labels(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(sharc.originators(), vec![0, 1, 2]);
        assert_eq!(sharc.round(), 0);
    }

    #[test]
    fn compute_without_init_originates_lazily() {
        let graph = clique(3);
        let mut sharc = Sharc::new(SharcConfig::new(Algorithm::Sharc).with_seed(0)).unwrap();
        sharc.compute(&graph);
        assert_eq!(sharc.labels(), vec![Some(0), Some(1), Some(2)]);
        assert_eq!(sharc.round(), 1);
    }

    #[test]
    fn old_score_tracks_previous_round() {
        let graph = clique(4);
        let mut sharc = Sharc::new(SharcConfig::new(Algorithm::Sharc).with_seed(0)).unwrap();
        sharc.init(&graph);
        sharc.compute(&graph);
        let after_first: Vec<f64> = (0..4).map(|u| sharc.score(u).unwrap()).collect();
        sharc.compute(&graph);
        for (u, &score) in after_first.iter().enumerate() {
            assert_eq!(sharc.state(u).unwrap().old_score, score);
        }
    }

    #[test]
    fn handle_tracks_node_lifecycle() {
        let mut sharc = Sharc::new(SharcConfig::default().with_seed(0)).unwrap();
        sharc.handle(&ChangeEvent::NodeAdded(2));
        assert_eq!(sharc.community(2), Some(2));
        assert_eq!(sharc.community(0), None);
        assert!(sharc.state(0).is_none());

        sharc.handle(&ChangeEvent::NodeRemoved(2));
        assert_eq!(sharc.community(2), None);
        // Unknown nodes are ignored.
        sharc.handle(&ChangeEvent::NodeRemoved(40));
        sharc.handle(&ChangeEvent::EdgeAdded { from: 0, to: 1 });
    }

    #[test]
    fn removed_nodes_are_forgotten_on_next_round() {
        let mut graph = petgraph::stable_graph::StableUnGraph::<(), ()>::default();
        let n: Vec<_> = (0..3).map(|_| graph.add_node(())).collect();
        let _ = graph.add_edge(n[0], n[1], ());
        let _ = graph.add_edge(n[1], n[2], ());
        let mut sharc = Sharc::new(SharcConfig::new(Algorithm::Sharc).with_seed(0)).unwrap();
        sharc.init(&graph);
        sharc.compute(&graph);

        let _ = graph.remove_node(n[1]);
        sharc.compute(&graph);
        assert_eq!(sharc.community(1), None);
        assert_eq!(sharc.community(0), Some(0));
        assert_eq!(sharc.community(2), Some(2));
    }

    /// Clique {0, 1, 2, 3} with node 4 hanging off node 3, all in one
    /// community, token settled on the pendant.
    fn kite(schedule: Schedule) -> (UnGraph<(), ()>, Sharc) {
        let mut graph = clique(4);
        let pendant = graph.add_node(());
        let _ = graph.add_edge(petgraph::graph::NodeIndex::new(3), pendant, ());

        let config = SharcConfig::new(Algorithm::Sharc)
            .with_schedule(schedule)
            .with_seed(0);
        let mut sharc = Sharc::new(config).unwrap();
        sharc.init(&graph);
        // Scores the kite settles on: 2/3 + 2/3 + 4/7 in the clique rim,
        // 3 * 4/7 at the hub, the neighbor-count fallback at the pendant.
        let scores = [40.0 / 21.0, 40.0 / 21.0, 40.0 / 21.0, 12.0 / 7.0, 1.0];
        for (s, score) in sharc.states.iter_mut().zip(scores) {
            *s = NodeState {
                community: Some(9),
                score,
                ..NodeState::default()
            };
        }
        sharc.states[4].originator.is_originator = true;
        (graph, sharc)
    }

    #[test]
    fn moved_token_is_evaluated_next_round() {
        for schedule in [Schedule::Synchronous, Schedule::Sequential] {
            let (graph, mut sharc) = kite(schedule);

            // The hub outscores the pendant.
            sharc.compute(&graph);
            assert_eq!(sharc.originators(), vec![3], "{schedule:?}");
            let hub = sharc.state(3).unwrap();
            assert_eq!(hub.originator.from, Some(4));
            assert!(!hub.originator.new_originator, "{schedule:?}");

            // One round later the rim outscores the hub.
            sharc.compute(&graph);
            assert_eq!(sharc.originators(), vec![0], "{schedule:?}");

            sharc.compute(&graph);
            assert_eq!(sharc.originators(), vec![0], "{schedule:?}");
            assert_eq!(sharc.labels(), vec![Some(9); 5]);
        }
    }

    #[test]
    fn holder_breaking_away_hands_off_its_old_token() {
        let graph = clique(3);
        let config = SharcConfig::new(Algorithm::StabilityAware).with_seed(0);
        let mut sharc = Sharc::new(config).unwrap();
        sharc.init(&graph);
        for (s, score) in sharc.states.iter_mut().zip([1.0, 1.0, 2.0]) {
            *s = NodeState {
                community: Some(9),
                score,
                ..NodeState::default()
            };
        }
        sharc.states[0].originator.is_originator = true;
        sharc.states[0].brk = Some(BreakState {
            countdown: 2,
            broken_community: 9,
            done: false,
        });

        // No partner to rejoin: node 0 starts its own community and the
        // token of 9 goes to its best remaining member.
        sharc.compute(&graph);
        assert_eq!(sharc.community(0), Some(0));
        assert_eq!(sharc.labels(), vec![Some(0), Some(9), Some(9)]);
        assert_eq!(sharc.originators(), vec![0, 2]);
        assert_eq!(sharc.state(2).unwrap().originator.from, Some(0));
        let brk = sharc.state(0).unwrap().brk.unwrap();
        assert!(brk.done);
        assert_eq!(brk.countdown, 1);
    }

    #[test]
    fn detect_rejects_empty_graph() {
        let graph = UnGraph::<(), ()>::new_undirected();
        assert_eq!(SharcConfig::default().detect(&graph), Err(Error::EmptyInput));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let graph = clique(6);
        let config = SharcConfig::new(Algorithm::TokenRandomWalk).with_seed(11);
        let run = || {
            let mut sharc = Sharc::new(config.clone()).unwrap();
            sharc.init(&graph);
            for _ in 0..20 {
                sharc.compute(&graph);
            }
            sharc.states().to_vec()
        };
        assert_eq!(run(), run());
    }
}
