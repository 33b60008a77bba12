//! Worklet handles and the worklet store.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::error::{Error, Resource, Result};
use crate::ids::WorkletId;
use crate::runtime::{Runtime, RuntimeInner};
use crate::shared::Shared;
use crate::value::Value;
use crate::worklet::{Body, Callable, Invocation, ListenerSlot};

/// Storage for one live worklet.
pub(crate) struct WorkletSlot {
    pub(crate) callable: Callable,
    pub(crate) listener: ListenerSlot,
    pub(crate) deployed: bool,
}

/// Handle to a worklet owned by a [`Runtime`].
#[derive(Clone)]
pub struct Worklet {
    id: WorkletId,
    rt: Weak<RuntimeInner>,
}

impl Worklet {
    /// Get the worklet's unique ID.
    pub fn id(&self) -> WorkletId {
        self.id
    }

    pub fn runtime(&self) -> Result<Runtime> {
        Runtime::upgrade(&self.rt)
    }

    pub(crate) fn runtime_ref(&self) -> &Weak<RuntimeInner> {
        &self.rt
    }

    pub fn is_alive(&self) -> bool {
        self.runtime()
            .map(|rt| rt.with_state(|state| state.worklets.contains_key(&self.id)))
            .unwrap_or(false)
    }

    /// The worklet's source text.
    pub fn source(&self) -> Result<Arc<str>> {
        self.with_slot(|slot| Ok(slot.callable.shared_source()))
    }

    /// Run the worklet with `args`.
    pub fn invoke(&self, args: &[Shared]) -> Result<Value> {
        self.call(args, None)
    }

    /// Run the worklet as an event handler.
    pub fn invoke_with_event(&self, args: &[Shared], event: &Value) -> Result<Value> {
        self.call(args, Some(event))
    }

    fn call(&self, args: &[Shared], event: Option<&Value>) -> Result<Value> {
        let rt = self.runtime()?;
        let (func, deploy) = rt.with_state(|state| {
            let slot = state
                .worklets
                .get_mut(&self.id)
                .ok_or(Error::UseAfterRelease(Resource::Worklet(self.id)))?;
            let deploy = match (&state.transport, slot.deployed) {
                (Some(transport), false) => {
                    slot.deployed = true;
                    Some((Arc::clone(transport), slot.callable.shared_source()))
                }
                _ => None,
            };
            Ok::<_, Error>((slot.callable.func(), deploy))
        })?;

        if let Some((transport, source)) = deploy {
            let path = rt.config().deploy_path(self.id.raw());
            debug!(worklet = %self.id, %path, "deploying worklet");
            transport.deploy(&path, &source);
        }

        trace!(worklet = %self.id, args = args.len(), "invoking worklet");
        func(&Invocation::new(&rt, args, event))
    }

    /// Register the completion listener.
    ///
    /// Fails with [`Error::ListenerOccupied`] if one is already registered.
    pub fn set_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.with_slot(|slot| {
            slot.listener
                .set(Arc::new(listener))
                .map_err(|_| Error::ListenerOccupied(self.id))
        })
    }

    /// Remove the completion listener. Returns whether one was registered.
    pub fn clear_listener(&self) -> Result<bool> {
        self.with_slot(|slot| Ok(slot.listener.clear().is_some()))
    }

    pub fn has_listener(&self) -> Result<bool> {
        self.with_slot(|slot| Ok(slot.listener.is_set()))
    }

    /// Fire the completion listener, if one is registered.
    ///
    /// The listener runs outside the runtime lock, so it may use the runtime.
    pub fn signal_completion(&self) -> Result<bool> {
        match self.with_slot(|slot| Ok(slot.listener.get()))? {
            Some(listener) => {
                trace!(worklet = %self.id, "completion signalled");
                listener();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release the worklet. Later invocations fail with a use after release.
    pub fn release(&self) -> Result<()> {
        self.runtime()?.release_worklet(self.id)
    }

    fn with_slot<R>(&self, f: impl FnOnce(&mut WorkletSlot) -> Result<R>) -> Result<R> {
        self.runtime()?.with_state(|state| {
            let slot = state
                .worklets
                .get_mut(&self.id)
                .ok_or(Error::UseAfterRelease(Resource::Worklet(self.id)))?;
            f(slot)
        })
    }
}

impl PartialEq for Worklet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Worklet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Worklet").field(&self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Worklet store
// ----------------------------------------------------------------------------

impl Runtime {
    /// Wrap a callable into a new worklet owned by the caller.
    pub fn worklet(&self, callable: Callable) -> Worklet {
        let id = WorkletId::new();
        trace!(worklet = %id, source = callable.source(), "worklet wrapped");
        self.with_state(|state| {
            state.worklets.insert(
                id,
                WorkletSlot {
                    callable,
                    listener: ListenerSlot::default(),
                    deployed: false,
                },
            );
        });
        Worklet {
            id,
            rt: self.downgrade(),
        }
    }

    /// Make `body` runnable on this runtime.
    ///
    /// Returns the worklet and whether the caller owns it. A body that is
    /// already wrapped is returned unchanged and is not owned.
    pub fn wrap(&self, body: impl Into<Body>) -> Result<(Worklet, bool)> {
        match body.into() {
            Body::Plain(callable) => Ok((self.worklet(callable), true)),
            Body::Wrapped(worklet) => {
                if !self.owns(worklet.runtime_ref()) {
                    return Err(Error::ForeignRuntime);
                }
                Ok((worklet, false))
            }
        }
    }

    pub(crate) fn release_worklet(&self, id: WorkletId) -> Result<()> {
        self.with_state(|state| {
            state
                .worklets
                .remove(&id)
                .map(|_| ())
                .ok_or(Error::UseAfterRelease(Resource::Worklet(id)))
        })?;
        debug!(worklet = %id, "worklet released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Callable) {
        let count = Arc::new(AtomicI32::new(0));
        let inner = count.clone();
        let callable = Callable::new("count", move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(Value::unset())
        });
        (count, callable)
    }

    #[test]
    fn invoke_runs_synchronously() {
        let rt = Runtime::new();
        let (count, callable) = counter();
        let worklet = rt.worklet(callable);

        worklet.invoke(&[]).unwrap();
        worklet.invoke(&[]).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wrapping_is_idempotent() {
        let rt = Runtime::new();
        let (_, callable) = counter();
        let (worklet, owned) = rt.wrap(callable).unwrap();
        assert!(owned);

        let (again, owned_again) = rt.wrap(worklet.clone()).unwrap();
        assert_eq!(again, worklet);
        assert!(!owned_again);
    }

    #[test]
    fn released_worklet_cannot_run() {
        let rt = Runtime::new();
        let (count, callable) = counter();
        let worklet = rt.worklet(callable);
        worklet.release().unwrap();

        let err = worklet.invoke(&[]).unwrap_err();
        assert!(err.is_use_after_release());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(worklet.release().unwrap_err().is_use_after_release());
    }

    #[test]
    fn listener_slot_is_exclusive() {
        let rt = Runtime::new();
        let (_, callable) = counter();
        let worklet = rt.worklet(callable);
        let fired = Arc::new(AtomicI32::new(0));
        let fired_clone = fired.clone();

        worklet
            .set_listener(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(matches!(
            worklet.set_listener(|| {}),
            Err(Error::ListenerOccupied(_))
        ));

        assert!(worklet.signal_completion().unwrap());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        assert!(worklet.clear_listener().unwrap());
        assert!(!worklet.signal_completion().unwrap());
    }

    #[test]
    fn invocation_exposes_arguments_and_event() {
        let rt = Runtime::new();
        let worklet = rt.worklet(Callable::new("echo", |inv| {
            let base = inv.arg(0)?.number()?;
            let bump = inv
                .event()
                .and_then(Value::as_scalar)
                .and_then(|s| s.as_number())
                .unwrap_or(0.0);
            Ok(Value::from(base + bump))
        }));
        let pkg = rt.create(Value::from(2.0)).unwrap();

        let plain = worklet.invoke(pkg.roots()).unwrap();
        assert_eq!(plain, Value::from(2.0));

        let with_event = worklet
            .invoke_with_event(pkg.roots(), &Value::from(3.0))
            .unwrap();
        assert_eq!(with_event, Value::from(5.0));

        assert!(matches!(
            worklet.invoke(&[]),
            Err(Error::MissingArgument { index: 0 })
        ));
    }
}
