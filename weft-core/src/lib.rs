//! Weft Core
//!
//! This crate provides the core runtime for Weft, a small reactive runtime
//! that runs computations described on a control context repeatedly and
//! synchronously on a latency-critical execution context.
//! It implements:
//!
//! - Shared value cells with explicit, reference-counted release
//! - Worklets: callables packaged to run on the execution context
//! - Mappers that re-run whenever a cell they read is written
//! - Repeat, mapper and event registrations over one uniform handle
//! - Animated style evaluation with minimal property diffs
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `shared`: cells, packaged value trees and packaging
//! - `worklet`: callables, worklet handles and listeners
//! - `mapper`: dependency-triggered re-evaluation
//! - `activation`: repeat, mapper and event registrations
//! - `style`: style records, animation engine, diffing and render targets
//! - `runtime`: the execution context tying it all together
//!
//! # Example
//!
//! ```rust
//! use weft_core::{Callable, Runtime, Value};
//!
//! let rt = Runtime::new();
//! let offset = rt.cell(0.0);
//! let doubled = rt.cell(0.0);
//!
//! let out = doubled.clone();
//! let body = Callable::new("(x) => x * 2", move |inv| {
//!     out.write(inv.arg(0)?.number()? * 2.0)?;
//!     Ok(Value::unset())
//! });
//!
//! let mut mapper = rt
//!     .mapper(body, vec![Value::Shared(weft_core::Shared::Leaf(offset.clone()))])
//!     .unwrap();
//! mapper.start().unwrap();
//!
//! offset.write(21.0).unwrap();
//! assert_eq!(doubled.read().unwrap().as_number(), Some(42.0));
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod ids;
pub mod mapper;
pub mod runtime;
pub mod shared;
pub mod style;
pub mod transport;
pub mod value;
pub mod worklet;

pub use activation::{Activation, EventHandler, Mapping, Registration, Repeat};
pub use config::RuntimeConfig;
pub use error::{Error, Resource, Result};
pub use ids::{CellId, MapperId, RepeatId, TargetId, WorkletId};
pub use mapper::MapperHandle;
pub use runtime::{EvaluationContext, Runtime, RuntimeStats};
pub use shared::{Cell, CellContent, Package, Shared};
pub use style::{
    AnimationDescriptor, AnimationState, Driver, EncodingTarget, PropertyDiff, PropertyUpdate,
    RecordingTarget, RenderTarget, Style, StyleApplier,
};
pub use transport::{install_source, Transport};
pub use value::{Scalar, Value};
pub use worklet::{Body, Callable, Invocation, Worklet};
