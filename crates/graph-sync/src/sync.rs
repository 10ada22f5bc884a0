//! Sync bridge between the local store and the backend mirrors
//!
//! The backend holds two reactive slots ("nodes" and "edges") with its
//! last-known copy of each sequence. On every tick the bridge pushes a side
//! outward only when the store marked it dirty *and* it differs from what
//! the backend already holds. Inbound mirror updates are recorded as the
//! backend's copy and are never treated as local changes, so an update
//! equal to local state produces no push at all.

use serde::{Deserialize, Serialize};

use crate::changes::AppliedChanges;
use crate::events::{EventSink, OutboundMessage};
use crate::store::{GraphStore, Mutation};
use crate::types::{GraphEdge, GraphNode};

/// One of the two backend state slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorSlot {
    Nodes,
    Edges,
}

/// Tracks the backend's copy of each slot and decides when to push
#[derive(Debug, Default)]
pub struct SyncBridge {
    mirror_nodes: Vec<GraphNode>,
    mirror_edges: Vec<GraphEdge>,
    /// Sides that must be re-pushed even if the store did not change them
    resync: Mutation,
}

impl SyncBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend's last-known node sequence
    pub fn mirror_nodes(&self) -> &[GraphNode] {
        &self.mirror_nodes
    }

    /// Backend's last-known edge sequence
    pub fn mirror_edges(&self) -> &[GraphEdge] {
        &self.mirror_edges
    }

    /// Run one tick: push every dirty side that differs from its mirror
    ///
    /// Returns the slots that were pushed, in push order (nodes first).
    pub fn tick(&mut self, store: &mut GraphStore, sink: &dyn EventSink) -> Vec<MirrorSlot> {
        let pending = store.take_dirty() | std::mem::take(&mut self.resync);
        let mut pushed = Vec::new();

        if pending.nodes && store.nodes() != self.mirror_nodes.as_slice() {
            let nodes = store.nodes().to_vec();
            match sink.send(OutboundMessage::MirrorNodes { nodes: nodes.clone() }) {
                Ok(()) => {
                    self.mirror_nodes = nodes;
                    pushed.push(MirrorSlot::Nodes);
                }
                Err(e) => {
                    log::warn!("Failed to push nodes mirror: {}", e);
                    self.resync |= Mutation::NODES;
                }
            }
        }

        if pending.edges && store.edges() != self.mirror_edges.as_slice() {
            let edges = store.edges().to_vec();
            match sink.send(OutboundMessage::MirrorEdges { edges: edges.clone() }) {
                Ok(()) => {
                    self.mirror_edges = edges;
                    pushed.push(MirrorSlot::Edges);
                }
                Err(e) => {
                    log::warn!("Failed to push edges mirror: {}", e);
                    self.resync |= Mutation::EDGES;
                }
            }
        }

        pushed
    }

    /// Record an inbound "nodes" slot update
    ///
    /// Returns whether the update diverged from local state. A divergent
    /// mirror is overwritten by the local sequence on the next tick; the
    /// backend changes the graph through commands, not through the slot.
    pub fn absorb_mirror_nodes(&mut self, nodes: Vec<GraphNode>, store: &GraphStore) -> bool {
        let diverged = nodes.as_slice() != store.nodes();
        if diverged {
            log::debug!("Inbound nodes mirror diverges from local state, scheduling resync");
            self.resync |= Mutation::NODES;
        }
        self.mirror_nodes = nodes;
        diverged
    }

    /// Record an inbound "edges" slot update; see [`Self::absorb_mirror_nodes`]
    pub fn absorb_mirror_edges(&mut self, edges: Vec<GraphEdge>, store: &GraphStore) -> bool {
        let diverged = edges.as_slice() != store.edges();
        if diverged {
            log::debug!("Inbound edges mirror diverges from local state, scheduling resync");
            self.resync |= Mutation::EDGES;
        }
        self.mirror_edges = edges;
        diverged
    }

    /// Emit discrete notifications for the structural additions of a change list
    pub fn notify(&self, applied: &AppliedChanges, sink: &dyn EventSink) {
        if !applied.added_nodes.is_empty() {
            let message = OutboundMessage::NodeChange {
                nodes: applied.added_nodes.clone(),
            };
            if let Err(e) = sink.send(message) {
                log::warn!("Failed to send node change notification: {}", e);
            }
        }
        for edge in &applied.added_edges {
            if let Err(e) = sink.send(OutboundMessage::Connected { edge: edge.clone() }) {
                log::warn!("Failed to send connection notification: {}", e);
            }
        }
    }
}
