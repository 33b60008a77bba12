//! Style Applier
//!
//! Drives one render target from a style worklet.
//!
//! # How It Works
//!
//! The style body is registered as a mapper over its inputs plus a
//! dedicated target cell. Each evaluation:
//!
//! 1. Runs the body, yielding a [`Style`].
//! 2. Reconciles the animation engine with the fresh style.
//! 3. Diffs the static properties against the last applied values.
//! 4. Starts the frame ticker if any animation is active, stops it
//!    otherwise.
//! 5. Pushes the diff to the render target.
//!
//! Each frame tick advances the animations and pushes their current values.
//!
//! The target is resolved from the target cell. While it is unresolved
//! nothing is pushed and nothing is recorded as applied, so attaching a
//! target pushes the full initial diff.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::activation::{Mapping, Registration, Repeat};
use crate::error::{Error, Result};
use crate::ids::TargetId;
use crate::runtime::Runtime;
use crate::shared::{Cell, Shared};
use crate::style::{
    AnimationEngine, AnimationRecord, PropertyDiff, PropertyDiffer, PropertyUpdate, RenderTarget,
    Style,
};
use crate::value::{Scalar, Value};
use crate::worklet::Callable;

/// Signature of a style body. It receives the packaged inputs.
pub type StyleFn = dyn Fn(&[Shared]) -> Result<Style> + Send + Sync;

#[derive(Debug, Default)]
struct StyleState {
    animations: AnimationEngine,
    differ: PropertyDiffer,
    evaluations: u64,
}

struct ApplierInner {
    body: Arc<StyleFn>,
    target: Arc<dyn RenderTarget>,
    target_cell: Cell,
    state: Mutex<StyleState>,
    ticker: Mutex<Option<Registration<Repeat>>>,
    mapper: Mutex<Option<Registration<Mapping>>>,
    closed: AtomicBool,
}

impl ApplierInner {
    fn evaluate(&self, args: &[Shared]) -> Result<()> {
        let (target_arg, inputs) = args
            .split_last()
            .ok_or(Error::MissingArgument { index: 0 })?;
        let style = (self.body)(inputs)?;
        let target = resolve_target(&target_arg.read()?);

        let (diff, animating) = {
            let mut state = self.state.lock();
            state.evaluations += 1;
            let animating = state.animations.reconcile(&style);
            let diff = state.differ.diff(&style);
            if target.is_some() {
                state.differ.commit(&diff);
            }
            (diff, animating)
        };
        trace!(changed = diff.len(), animating, "style evaluated");

        self.set_ticking(animating)?;
        if let Some(target) = target {
            self.push(target, diff);
        }
        Ok(())
    }

    fn tick(&self, rt: &Runtime) -> Result<Value> {
        let target = self.resolved_target()?;
        let dt = rt.frame_delta();

        let tick = {
            let mut state = self.state.lock();
            let tick = state.animations.tick(dt);
            if target.is_some() {
                state.differ.commit(&tick.updates);
            }
            tick
        };

        if let Some(target) = target {
            self.push(target, tick.updates);
        }
        if tick.all_finished {
            debug!("animations finished");
        }
        Ok(Value::from(tick.all_finished))
    }

    fn set_ticking(&self, on: bool) -> Result<()> {
        let mut ticker = self.ticker.lock();
        match ticker.as_mut() {
            Some(reg) if on => reg.start(),
            Some(reg) => reg.stop(),
            None => Ok(()),
        }
    }

    fn push(&self, target: TargetId, props: PropertyDiff) {
        if props.is_empty() {
            return;
        }
        self.target
            .apply_property_update(&PropertyUpdate { target, props });
    }

    fn resolved_target(&self) -> Result<Option<TargetId>> {
        Ok(resolve_target(&self.target_cell.read()?))
    }

    fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mapper = self.mapper.lock().take();
        let ticker = self.ticker.lock().take();

        let mut first_error = mapper.map(Registration::teardown).and_then(Result::err);
        if let Some(Err(err)) = ticker.map(Registration::teardown) {
            first_error.get_or_insert(err);
        }
        if let Err(err) = self.target_cell.release() {
            if !matches!(err, Error::RuntimeDropped) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ApplierInner {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "style applier teardown on drop failed");
        }
    }
}

/// A target id is a non-negative whole number. Anything else is unresolved.
fn resolve_target(value: &Scalar) -> Option<TargetId> {
    match value {
        Scalar::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
            Some(TargetId(*n as u64))
        }
        _ => None,
    }
}

/// Applies a style worklet's output to a render target.
///
/// Created inactive; call [`start`](Self::start).
pub struct StyleApplier {
    inner: Arc<ApplierInner>,
}

impl StyleApplier {
    /// Start evaluating the style. The body runs once immediately.
    pub fn start(&self) -> Result<()> {
        match self.inner.mapper.lock().as_mut() {
            Some(reg) => reg.start(),
            None => Ok(()),
        }
    }

    /// Stop reacting to input changes and stop any running animation.
    pub fn stop(&self) -> Result<()> {
        if let Some(reg) = self.inner.mapper.lock().as_mut() {
            reg.stop()?;
        }
        self.inner.set_ticking(false)
    }

    pub fn is_active(&self) -> bool {
        self.inner
            .mapper
            .lock()
            .as_ref()
            .is_some_and(Registration::is_active)
    }

    /// Bind the render target. Re-evaluates the style if started.
    pub fn attach(&self, target: TargetId) -> Result<()> {
        self.inner.target_cell.write(target.0 as f64)
    }

    /// Unbind the render target. Updates stop until the next attach.
    pub fn detach(&self) -> Result<()> {
        self.inner.target_cell.write(Scalar::Unset)
    }

    /// The packaged inputs the style body receives.
    pub fn inputs(&self) -> Vec<Shared> {
        self.inner
            .mapper
            .lock()
            .as_ref()
            .and_then(|reg| reg.args().split_last())
            .map(|(_, inputs)| inputs.to_vec())
            .unwrap_or_default()
    }

    pub fn target(&self) -> Result<Option<TargetId>> {
        self.inner.resolved_target()
    }

    /// The cell caching the target id. It is one of the mapper's inputs.
    pub fn target_cell(&self) -> &Cell {
        &self.inner.target_cell
    }

    /// Evaluate the body once with current inputs and return its static
    /// properties, for the first render. Nothing is pushed or recorded.
    pub fn initial_props(&self) -> Result<PropertyDiff> {
        let style = (self.inner.body)(&self.inputs())?;
        Ok(style
            .statics()
            .filter(|(_, value)| !value.is_unset())
            .map(|(key, value)| (key.to_owned(), value.clone()))
            .collect())
    }

    pub fn animation(&self, key: &str) -> Option<AnimationRecord> {
        self.inner.state.lock().animations.get(key).cloned()
    }

    /// Keys of the animations still running.
    pub fn active_animations(&self) -> Vec<String> {
        self.inner.state.lock().animations.active_keys()
    }

    /// Values last pushed to the render target, per key.
    pub fn last_applied(&self) -> IndexMap<String, Scalar> {
        self.inner.state.lock().differ.last_applied().clone()
    }

    /// How many times the style body has been evaluated by the mapper.
    pub fn evaluations(&self) -> u64 {
        self.inner.state.lock().evaluations
    }

    /// Whether the frame ticker is running.
    pub fn is_animating(&self) -> bool {
        self.inner
            .ticker
            .lock()
            .as_ref()
            .is_some_and(Registration::is_active)
    }

    /// Called whenever all running animations finish.
    pub fn set_animation_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self.inner.ticker.lock().as_ref() {
            Some(reg) => reg.set_listener(listener),
            None => Ok(()),
        }
    }

    /// Stop everything and release the target cell and both worklets.
    pub fn teardown(self) -> Result<()> {
        self.inner.shutdown()
    }
}

impl fmt::Debug for StyleApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleApplier")
            .field("target_cell", &self.inner.target_cell)
            .field("evaluations", &self.evaluations())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Create a style applier for `body` over `inputs`.
    ///
    /// The applier starts detached and inactive.
    pub fn style_applier<F>(
        &self,
        source: &str,
        inputs: Vec<Value>,
        target: Arc<dyn RenderTarget>,
        body: F,
    ) -> Result<StyleApplier>
    where
        F: Fn(&[Shared]) -> Result<Style> + Send + Sync + 'static,
    {
        let target_cell = self.cell(Scalar::Unset);
        let inner = Arc::new(ApplierInner {
            body: Arc::new(body),
            target,
            target_cell: target_cell.clone(),
            state: Mutex::new(StyleState::default()),
            ticker: Mutex::new(None),
            mapper: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let tick_weak = Weak::clone(&weak);
        let tick = Callable::new(format!("{source}:tick"), move |inv| {
            match tick_weak.upgrade() {
                Some(inner) => inner.tick(inv.runtime()),
                None => Ok(Value::from(true)),
            }
        });
        let update = Callable::new(source, move |inv| {
            if let Some(inner) = weak.upgrade() {
                inner.evaluate(inv.args())?;
            }
            Ok(Value::unset())
        });

        let mut args = inputs;
        args.push(Value::Shared(Shared::Leaf(target_cell)));

        // On failure `inner` drops here and releases the target cell.
        let ticker = self.repeat(tick, Vec::new())?;
        let mapper = self.mapper(update, args)?;
        *inner.ticker.lock() = Some(ticker);
        *inner.mapper.lock() = Some(mapper);

        debug!(source, "style applier created");
        Ok(StyleApplier { inner })
    }
}
