//! Pick-one list for activated clusters.
//!
//! Activating a cluster opens a list of its members. At most one list is open;
//! opening another replaces the current one wholesale, so a list never shows
//! items from two clusters. Selecting an entry closes the list and hands the id
//! to the focus controller.

use log::debug;

use crate::{GeoPoint, PointId};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisambiguationState {
    #[default]
    Closed,
    Open { items: Vec<GeoPoint> },
}

#[derive(Debug, Clone, Default)]
pub struct DisambiguationFlow {
    state: DisambiguationState,
}

impl DisambiguationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DisambiguationState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DisambiguationState::Open { .. })
    }

    /// Items of the open list, empty when closed.
    pub fn items(&self) -> &[GeoPoint] {
        match &self.state {
            DisambiguationState::Open { items } => items,
            DisambiguationState::Closed => &[],
        }
    }

    /// Open the list with a cluster's members, replacing any open list.
    pub fn activate_cluster(&mut self, items: Vec<GeoPoint>) {
        if items.is_empty() {
            self.state = DisambiguationState::Closed;
            return;
        }
        debug!("[Disambiguation] Opening list with {} items", items.len());
        self.state = DisambiguationState::Open { items };
    }

    /// Pick an entry. The list closes either way; the id is handed out only
    /// if it was one of the listed items.
    pub fn select(&mut self, id: &PointId) -> Option<PointId> {
        let listed = self.items().iter().any(|p| &p.id == id);
        self.state = DisambiguationState::Closed;
        listed.then(|| id.clone())
    }

    /// Close from the list's own close control.
    pub fn dismiss(&mut self) {
        self.state = DisambiguationState::Closed;
    }

    /// Close from the keyboard (escape).
    pub fn cancel(&mut self) {
        self.state = DisambiguationState::Closed;
    }
}
