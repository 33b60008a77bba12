//! Frame clock
//!
//! Repeating worklets are enrolled in the frame clock. Every call to
//! [`Runtime::frame`] invokes each enrolled worklet once, in enrollment
//! order. A worklet that returns `true` has finished: it is unenrolled and
//! its completion listener fires. Unenrolling during a frame takes effect
//! immediately; an entry removed before its turn is skipped.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::error::Result;
use crate::ids::RepeatId;
use crate::runtime::Runtime;
use crate::shared::Shared;
use crate::worklet::Worklet;

#[derive(Clone)]
struct FrameEntry {
    worklet: Worklet,
    args: Arc<[Shared]>,
}

#[derive(Default)]
pub(crate) struct FrameClock {
    entries: IndexMap<RepeatId, FrameEntry>,
    frame: u64,
    delta: Option<Duration>,
}

impl FrameClock {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Runtime {
    pub(crate) fn enroll(&self, worklet: Worklet, args: Arc<[Shared]>) -> RepeatId {
        let id = RepeatId::new();
        trace!(repeat = %id, worklet = %worklet.id(), "enrolled in frame clock");
        self.with_state(|state| {
            state.frames.entries.insert(id, FrameEntry { worklet, args });
        });
        id
    }

    pub(crate) fn unenroll(&self, id: RepeatId) -> bool {
        let removed = self.with_state(|state| state.frames.entries.shift_remove(&id).is_some());
        if removed {
            trace!(repeat = %id, "left frame clock");
        }
        removed
    }

    pub(crate) fn is_enrolled(&self, id: RepeatId) -> bool {
        self.with_state(|state| state.frames.entries.contains_key(&id))
    }

    /// Run one frame using the configured frame interval.
    ///
    /// Returns how many worklets ran.
    pub fn frame(&self) -> Result<usize> {
        self.advance_frame(self.config().frame_interval())
    }

    /// Run one frame that advances time by `delta`.
    ///
    /// A worklet that fails is unenrolled; the frame still runs the rest and
    /// the first error is returned.
    pub fn advance_frame(&self, delta: Duration) -> Result<usize> {
        let (frame, entries) = self.with_state(|state| {
            state.frames.frame += 1;
            state.frames.delta = Some(delta);
            let entries: Vec<_> = state
                .frames
                .entries
                .iter()
                .map(|(id, entry)| (*id, entry.clone()))
                .collect();
            (state.frames.frame, entries)
        });

        let mut ran = 0;
        let mut first_error = None;
        for (id, entry) in entries {
            if !self.is_enrolled(id) {
                continue;
            }
            ran += 1;
            match entry.worklet.invoke(&entry.args) {
                Ok(done) if done.is_true() => {
                    self.unenroll(id);
                    if let Err(err) = entry.worklet.signal_completion() {
                        first_error.get_or_insert(err);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(repeat = %id, error = %err, "repeating worklet failed");
                    self.unenroll(id);
                    first_error.get_or_insert(err);
                }
            }
        }

        trace!(frame, ran, "frame complete");
        first_error.map_or(Ok(ran), Err)
    }

    /// Time step of the current (or most recent) frame.
    pub fn frame_delta(&self) -> Duration {
        self.with_state(|state| state.frames.delta)
            .unwrap_or_else(|| self.config().frame_interval())
    }

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.with_state(|state| state.frames.frame)
    }

    /// Whether any worklet is enrolled in the frame clock.
    pub fn is_animating(&self) -> bool {
        self.with_state(|state| !state.frames.entries.is_empty())
    }
}
