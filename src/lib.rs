//! # sharc
//!
//! Decentralized, epidemic community detection for weighted, time-varying
//! graphs: the SHARC family of local label-aggregation algorithms, a
//! freshness/break state machine against stale labels, and per-community
//! originator tracking.
//!
//! Nodes only read their immediate neighbors, so the algorithms fit ad hoc
//! and mobile networks where no node sees the whole topology.

pub mod community;
/// Error types used across `sharc`.
pub mod error;


pub use community::{
    Algorithm, ChangeEvent, CommunityDetection, DynamicGraph, NodeState, Schedule, Sharc,
    SharcConfig,
};
pub use error::{Error, Result};
