//! Subscription bookkeeping for mappers.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::ids::{CellId, MapperId};
use crate::shared::Shared;
use crate::worklet::Worklet;

/// Subscribers of one cell. Most cells feed only a handful of mappers.
type Subscribers = SmallVec<[MapperId; 4]>;

pub(crate) struct MapperSlot {
    pub(crate) worklet: Worklet,
    pub(crate) args: Arc<[Shared]>,
    pub(crate) dependencies: Vec<CellId>,
}

/// Everything needed to evaluate a mapper without holding the runtime lock.
#[derive(Clone)]
pub(crate) struct MapperJob {
    pub(crate) id: MapperId,
    pub(crate) worklet: Worklet,
    pub(crate) args: Arc<[Shared]>,
}

/// Mapper slots plus the reverse index from cells to their subscribers.
#[derive(Default)]
pub(crate) struct MapperRegistry {
    slots: IndexMap<MapperId, MapperSlot>,
    subscriptions: HashMap<CellId, Subscribers>,
}

impl MapperRegistry {
    pub(crate) fn insert(&mut self, id: MapperId, slot: MapperSlot) {
        for cell in &slot.dependencies {
            self.subscriptions.entry(*cell).or_default().push(id);
        }
        self.slots.insert(id, slot);
    }

    /// Remove a mapper and all of its subscriptions.
    pub(crate) fn remove(&mut self, id: MapperId) -> bool {
        let Some(slot) = self.slots.shift_remove(&id) else {
            return false;
        };
        for cell in &slot.dependencies {
            if let Some(subscribers) = self.subscriptions.get_mut(cell) {
                subscribers.retain(|m| *m != id);
                if subscribers.is_empty() {
                    self.subscriptions.remove(cell);
                }
            }
        }
        true
    }

    /// Mappers subscribed to `cell`, in subscription order.
    pub(crate) fn subscribers(&self, cell: CellId) -> Subscribers {
        self.subscriptions.get(&cell).cloned().unwrap_or_default()
    }

    pub(crate) fn job(&self, id: MapperId) -> Option<MapperJob> {
        self.slots.get(&id).map(|slot| MapperJob {
            id,
            worklet: slot.worklet.clone(),
            args: Arc::clone(&slot.args),
        })
    }

    /// Drop a freed cell from every subscription list.
    pub(crate) fn forget_cell(&mut self, cell: CellId) {
        let Some(subscribers) = self.subscriptions.remove(&cell) else {
            return;
        };
        for id in subscribers {
            if let Some(slot) = self.slots.get_mut(&id) {
                slot.dependencies.retain(|c| *c != cell);
            }
        }
    }

    pub(crate) fn contains(&self, id: MapperId) -> bool {
        self.slots.contains_key(&id)
    }

    pub(crate) fn dependencies(&self, id: MapperId) -> Option<&[CellId]> {
        self.slots.get(&id).map(|slot| slot.dependencies.as_slice())
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

// ---- Tests ----
