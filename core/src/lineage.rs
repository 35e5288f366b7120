//! Traversal of a state's ancestry.
//!
//! Each [`VehicleState`] holds a shared link to the state it was derived from, so a track
//! is a persistent singly linked list with the newest state at the head. Siblings derived
//! from the same parent share the common tail.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::graph::EdgeId;
use crate::state::VehicleState;

/// Iterator from a state back to the root of its track, newest first.
#[derive(Clone, Debug)]
pub struct Lineage<'a> {
    next: Option<&'a VehicleState>,
}
impl<'a> Iterator for Lineage<'a> {
    type Item = &'a VehicleState;
    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent().map(Arc::as_ref);
        Some(current)
    }
}

impl VehicleState {
    /// This state followed by all of its ancestors.
    pub fn lineage(&self) -> Lineage<'_> {
        Lineage { next: Some(self) }
    }
    /// Number of transitions between the root and this state.
    pub fn depth(&self) -> usize {
        self.lineage().count() - 1
    }
    pub fn root(&self) -> &VehicleState {
        self.lineage().last().unwrap_or(self)
    }
    /// Edge of every state from the root to this one; `None` marks off-road states.
    pub fn edge_history(&self) -> Vec<Option<EdgeId>> {
        let mut history: Vec<Option<EdgeId>> =
            self.lineage().map(|s| s.edge().map(|e| e.id())).collect();
        history.reverse();
        history
    }
    /// Observation indices from the root to this state.
    pub fn observation_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.lineage().map(|s| s.observation().index()).collect();
        indices.reverse();
        indices
    }
    /// Observation timestamps from the root to this state.
    pub fn observation_timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut stamps: Vec<DateTime<Utc>> =
            self.lineage().map(|s| s.observation().timestamp()).collect();
        stamps.reverse();
        stamps
    }
}
