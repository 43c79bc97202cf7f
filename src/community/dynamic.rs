//! A minimal time-varying graph and round driver.
//!
//! [`DynamicGraph`] stores an undirected [`StableGraph`] (node indices stay
//! valid across removals), queues a [`ChangeEvent`] for every mutation and,
//! on [`step`](DynamicGraph::step), ages the edges, hands the queued events
//! to the detector and runs one round.
//!
//! Edge age counts the steps an edge has existed without interruption. With
//! [`with_age_weights`](DynamicGraph::with_age_weights) the age replaces the
//! edge weight, so the weighted variants favor long-lived links.

use super::graph_view::{EdgeWeight, NodeId};
use super::sharc::Sharc;
use crate::error::{Error, Result};
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Undirected;

/// A change to the graph, as seen by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeEvent {
    /// A node joined.
    NodeAdded(NodeId),
    /// A node left, together with its edges.
    NodeRemoved(NodeId),
    /// A link appeared.
    EdgeAdded {
        /// One endpoint.
        from: NodeId,
        /// The other endpoint.
        to: NodeId,
    },
    /// A link disappeared.
    EdgeRemoved {
        /// One endpoint.
        from: NodeId,
        /// The other endpoint.
        to: NodeId,
    },
    /// A new time step starts.
    StepBegins(u64),
}

/// Edge payload of a [`DynamicGraph`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Link {
    /// Explicit weight, if any.
    pub weight: Option<f64>,
    /// Steps this edge has existed.
    pub age: u64,
}

impl EdgeWeight for Link {
    fn weight(&self) -> Option<f64> {
        self.weight
    }
}

/// Undirected graph that records its own changes.
#[derive(Debug, Clone, Default)]
pub struct DynamicGraph {
    graph: StableGraph<(), Link, Undirected>,
    pending: Vec<ChangeEvent>,
    step: u64,
    age_weights: bool,
}

impl DynamicGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the age of every edge into its weight on each step.
    pub fn with_age_weights(mut self, enabled: bool) -> Self {
        self.age_weights = enabled;
        self
    }

    /// Underlying graph, usable wherever a `GraphView` is expected.
    pub fn graph(&self) -> &StableGraph<(), Link, Undirected> {
        &self.graph
    }

    /// Steps run so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Events queued since the last step.
    pub fn pending(&self) -> &[ChangeEvent] {
        &self.pending
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self) -> NodeId {
        let u = self.graph.add_node(()).index();
        self.pending.push(ChangeEvent::NodeAdded(u));
        u
    }

    /// Remove a node and its edges.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let idx = self.index(node)?;
        let neighbors: Vec<NodeId> = self.graph.neighbors(idx).map(|v| v.index()).collect();
        for v in neighbors {
            self.pending.push(ChangeEvent::EdgeRemoved { from: node, to: v });
        }
        let _ = self.graph.remove_node(idx);
        self.pending.push(ChangeEvent::NodeRemoved(node));
        Ok(())
    }

    /// Link two nodes. Returns `false` if they were already linked.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool> {
        let (a, b) = (self.index(from)?, self.index(to)?);
        if self.graph.find_edge(a, b).is_some() {
            return Ok(false);
        }
        let _ = self.graph.add_edge(a, b, Link::default());
        self.pending.push(ChangeEvent::EdgeAdded { from, to });
        Ok(true)
    }

    /// Unlink two nodes. Returns `false` if they were not linked.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<bool> {
        let (a, b) = (self.index(from)?, self.index(to)?);
        let Some(e) = self.graph.find_edge(a, b) else {
            return Ok(false);
        };
        let _ = self.graph.remove_edge(e);
        self.pending.push(ChangeEvent::EdgeRemoved { from, to });
        Ok(true)
    }

    /// Set the explicit weight of an existing edge. Returns `false` if the
    /// nodes are not linked.
    pub fn set_weight(&mut self, from: NodeId, to: NodeId, weight: f64) -> Result<bool> {
        let (a, b) = (self.index(from)?, self.index(to)?);
        let Some(link) = self
            .graph
            .find_edge(a, b)
            .and_then(|e| self.graph.edge_weight_mut(e))
        else {
            return Ok(false);
        };
        link.weight = Some(weight);
        Ok(true)
    }

    /// Age of the edge between two nodes.
    pub fn age(&self, from: NodeId, to: NodeId) -> Option<u64> {
        let (a, b) = (self.index(from).ok()?, self.index(to).ok()?);
        let e = self.graph.find_edge(a, b)?;
        self.graph.edge_weight(e).map(|link| link.age)
    }

    /// Advance one step: age edges, deliver queued events, run one round.
    pub fn step(&mut self, sharc: &mut Sharc) {
        self.step += 1;
        for link in self.graph.edge_weights_mut() {
            link.age += 1;
            if self.age_weights {
                link.weight = Some(link.age as f64);
            }
        }

        sharc.handle(&ChangeEvent::StepBegins(self.step));
        for event in self.pending.drain(..) {
            sharc.handle(&event);
        }
        sharc.compute(&self.graph);
    }

    fn index(&self, node: NodeId) -> Result<NodeIndex> {
        let idx = NodeIndex::new(node);
        if self.graph.contains_node(idx) {
            Ok(idx)
        } else {
            Err(Error::NodeNotFound(node))
        }
    }
}
