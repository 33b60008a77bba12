//! Cancellation handle for a registered mapper.

use std::sync::Weak;

use tracing::debug;

use crate::ids::{CellId, MapperId};
use crate::runtime::{Runtime, RuntimeInner};

/// Handle returned by [`Runtime::register_mapper`].
///
/// Dropping the handle does not stop the mapper; call [`stop`](Self::stop).
#[derive(Clone)]
pub struct MapperHandle {
    id: MapperId,
    rt: Weak<RuntimeInner>,
}

impl MapperHandle {
    pub(crate) fn new(id: MapperId, rt: Weak<RuntimeInner>) -> Self {
        Self { id, rt }
    }

    pub fn id(&self) -> MapperId {
        self.id
    }

    /// Whether the mapper is still subscribed.
    pub fn is_active(&self) -> bool {
        Runtime::upgrade(&self.rt)
            .map(|rt| rt.with_state(|state| state.mappers.contains(self.id)))
            .unwrap_or(false)
    }

    /// Cells the mapper is subscribed to, in pre-order.
    pub fn dependencies(&self) -> Vec<CellId> {
        Runtime::upgrade(&self.rt)
            .ok()
            .and_then(|rt| {
                rt.with_state(|state| state.mappers.dependencies(self.id).map(<[_]>::to_vec))
            })
            .unwrap_or_default()
    }

    /// Unsubscribe the mapper. A queued run that has not started yet is
    /// skipped.
    ///
    /// Returns `false` if the mapper was already stopped.
    pub fn stop(&self) -> bool {
        let Ok(rt) = Runtime::upgrade(&self.rt) else {
            return false;
        };
        let stopped = rt.with_state(|state| state.mappers.remove(self.id));
        if stopped {
            debug!(mapper = %self.id, "mapper stopped");
        }
        stopped
    }
}

impl std::fmt::Debug for MapperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
