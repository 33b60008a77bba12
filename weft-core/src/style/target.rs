//! Render targets
//!
//! A render target receives property updates for one view. The runtime
//! never renders anything itself; it only hands each update to the bound
//! target, outside the runtime lock.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::ids::TargetId;
use crate::style::PropertyDiff;

/// Changed properties of one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub target: TargetId,
    pub props: PropertyDiff,
}

impl PropertyUpdate {
    /// Encode as MessagePack, with struct fields as map keys.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

pub trait RenderTarget: Send + Sync {
    fn apply_property_update(&self, update: &PropertyUpdate);
}

/// Keeps every update it receives.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    updates: Mutex<Vec<PropertyUpdate>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<PropertyUpdate> {
        self.updates.lock().clone()
    }

    /// Remove and return everything received so far.
    pub fn take(&self) -> Vec<PropertyUpdate> {
        std::mem::take(&mut *self.updates.lock())
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }
}

impl RenderTarget for RecordingTarget {
    fn apply_property_update(&self, update: &PropertyUpdate) {
        self.updates.lock().push(update.clone());
    }
}

/// Encodes every update as MessagePack and hands the bytes to a sink.
pub struct EncodingTarget<F> {
    sink: F,
}

impl<F> EncodingTarget<F>
where
    F: Fn(Vec<u8>) + Send + Sync,
{
    pub fn new(sink: F) -> Self {
        Self { sink }
    }
}

impl<F> RenderTarget for EncodingTarget<F>
where
    F: Fn(Vec<u8>) + Send + Sync,
{
    fn apply_property_update(&self, update: &PropertyUpdate) {
        match update.to_msgpack() {
            Ok(bytes) => (self.sink)(bytes),
            Err(err) => warn!(target_id = %update.target, error = %err, "failed to encode property update"),
        }
    }
}
