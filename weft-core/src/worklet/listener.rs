//! Single-slot completion listener.

use std::fmt;
use std::sync::Arc;

/// Callback fired when a worklet signals completion.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Holds at most one listener.
///
/// Setting a listener on an occupied slot fails and leaves the existing
/// listener in place; the slot must be cleared first.
#[derive(Default, Clone)]
pub struct ListenerSlot(Option<Listener>);

impl ListenerSlot {
    /// Store `listener` if the slot is empty.
    ///
    /// Returns the rejected listener if the slot was occupied.
    pub fn set(&mut self, listener: Listener) -> Result<(), Listener> {
        if self.0.is_some() {
            return Err(listener);
        }
        self.0 = Some(listener);
        Ok(())
    }

    /// Empty the slot, returning the listener it held.
    pub fn clear(&mut self) -> Option<Listener> {
        self.0.take()
    }

    /// The current listener, if any.
    pub fn get(&self) -> Option<Listener> {
        self.0.clone()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerSlot").field(&self.is_set()).finish()
    }
}
