//! Decentralized community detection for dynamic graphs.
//!
//! Every node only ever reads its immediate neighbors. A node holds a
//! community label and, once per round, picks the label best supported by
//! its neighbors. Labels spread like an epidemic until dense regions agree.
//!
//! ## Local scoring
//!
//! For node `u`, every labeled entering neighbor `v` votes for its label
//! with weight `sim(u, v)`:
//!
//! ```text
//! score(c) = Σ_{v ∈ N(u), label(v) = c} sim(u, v)
//! ```
//!
//! The label with the highest score wins, the lowest label on ties. A node
//! with no labeled neighbor starts a community named after itself.
//!
//! The members of the family differ in `sim`:
//!
//! - **Baseline**: every vote counts 1 (plain epidemic propagation).
//! - **SHARC**: neighborhood similarity, `1 - non_shared / (deg(u) + deg(v))`.
//!   Neighbors that share few neighbors with `u` barely count, so labels do
//!   not leak across bridges. When all similarities are 0 the plain vote
//!   count decides.
//! - **CDF-weighted / max-weighted**: SHARC similarity discounted by link
//!   weight, either by the rank of the weight among `u`'s links or linearly
//!   against the heaviest one.
//!
//! ## Stability
//!
//! In a mobile network a label can get stuck: the community has drifted
//! apart but its members keep voting for each other. The stability-aware
//! variants track a *freshness* clock propagated from the community
//! representative; a node that stops hearing it breaks away for a few
//! rounds and rebuilds from scratch (see [`StabilityController`]).
//!
//! ## Originators
//!
//! Each community carries one token, held by its *originator*. The token
//! drifts towards the best-connected member (or random-walks there) and is
//! handed over when its holder changes community. After each round every
//! connected same-label component holds exactly one token.
//!
//! ## Usage
//!
//! ```rust
//! use petgraph::graph::UnGraph;
//! use sharc::community::{Algorithm, CommunityDetection, SharcConfig};
//!
//! // Two triangles
//! let mut graph = UnGraph::<(), ()>::new_undirected();
//! let n: Vec<_> = (0..6).map(|_| graph.add_node(())).collect();
//! for (a, b) in [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)] {
//!     graph.add_edge(n[a], n[b], ());
//! }
//!
//! let config = SharcConfig::new(Algorithm::Sharc).with_seed(42);
//! let communities = config.detect(&graph).unwrap();
//! assert_eq!(communities, vec![0, 0, 0, 1, 1, 1]);
//! ```
//!
//! For graphs that change between rounds, drive a [`Sharc`] directly or use
//! [`DynamicGraph`].
//!
//! ## References
//!
//! - Herbiet, Bouvry (2010). "SHARC: community-based partitioning for mobile
//!   ad hoc networks using neighborhood similarity." IEEE WoWMoM 2010.

mod config;
mod dynamic;
mod graph_view;
mod originator;
mod scorer;
mod sharc;
mod similarity;
mod stability;
mod state;
mod traits;

pub use config::{Algorithm, Schedule, SharcConfig};
pub use dynamic::{ChangeEvent, DynamicGraph, Link};
pub use graph_view::{EdgeWeight, GraphView, NodeId, Topology};
pub use originator::{reconcile, OriginatorPolicy, Repairs};
pub use scorer::{LocalScorer, Proposal};
pub use sharc::Sharc;
pub use similarity::{
    neighborhood_similarity, CdfRankSimilarity, CountSimilarity, MaxWeightSimilarity,
    NeighborhoodSimilarity,
};
pub use stability::{edge_threshold, StabilityController};
pub use state::{BreakState, NodeState, OriginatorState, Phase};
pub use traits::{CommunityDetection, SimilarityStrategy};
