//! Marker registry: `PointId → MarkerHandle`.
//!
//! Handles are generational. When a marker unmounts its slot generation is bumped,
//! so a handle held past that point (by a pending focus request, say) no longer
//! resolves. Callers always go through [`MarkerRegistry::resolve`] or
//! [`MarkerRegistry::is_live`] instead of assuming a handle is still mounted.

use std::collections::HashMap;

use crate::PointId;

/// Render handle for one on-screen marker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MarkerHandle {
    index: u32,
    generation: u32,
}

impl MarkerHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    occupant: Option<PointId>,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_id: HashMap<PointId, MarkerHandle>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Register a mounted marker for `id`.
    ///
    /// Mounting an id that is already mounted keeps the existing handle.
    pub fn mount(&mut self, id: PointId) -> MarkerHandle {
        if let Some(handle) = self.by_id.get(&id) {
            return *handle;
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.occupant = Some(id.clone());

        let handle = MarkerHandle { index, generation: slot.generation };
        self.by_id.insert(id, handle);
        handle
    }

    /// Remove the marker for `id`, invalidating its handle.
    pub fn unmount(&mut self, id: &PointId) -> Option<MarkerHandle> {
        let handle = self.by_id.remove(id)?;
        let slot = &mut self.slots[handle.index as usize];
        slot.occupant = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(handle)
    }

    /// Unmount every marker whose id is not in `keep`; returns how many were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&PointId) -> bool,
    {
        let stale: Vec<PointId> = self.by_id.keys().filter(|id| !keep(id)).cloned().collect();
        for id in &stale {
            self.unmount(id);
        }
        stale.len()
    }

    pub fn get(&self, id: &PointId) -> Option<MarkerHandle> {
        self.by_id.get(id).copied()
    }

    /// Point id behind a handle, if the handle is still current.
    pub fn resolve(&self, handle: MarkerHandle) -> Option<&PointId> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.occupant.as_ref()
    }

    pub fn is_live(&self, handle: MarkerHandle) -> bool {
        self.resolve(handle).is_some()
    }
}
