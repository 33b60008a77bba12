//! Closure Transport
//!
//! The transport is the one crossing point between the control context and
//! the execution context: it installs source text under a path on the
//! execution side. A runtime has at most one bound transport; binding and
//! unbinding are explicit.
//!
//! Only scalars and callables can be installed. Anything else is not
//! transportable and is skipped without an error.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::runtime::Runtime;
use crate::value::Value;
use crate::worklet::Body;

/// Installs source text on the execution side.
pub trait Transport: Send + Sync {
    fn deploy(&self, path: &str, source: &str);
}

impl<F> Transport for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn deploy(&self, path: &str, source: &str) {
        self(path, source)
    }
}

/// Source text for installing `value`, or `None` if it is not transportable.
pub fn install_source(value: &Value) -> Option<String> {
    match value {
        Value::Leaf(scalar) => scalar.to_source(),
        Value::Callable(Body::Plain(callable)) => Some(format!("({})", callable.source())),
        Value::Callable(Body::Wrapped(worklet)) => {
            worklet.source().ok().map(|source| format!("({source})"))
        }
        Value::Sequence(_) | Value::Record(_) | Value::Shared(_) => None,
    }
}

impl Runtime {
    /// Bind a transport, returning the previously bound one.
    pub fn bind_transport(&self, transport: Arc<dyn Transport>) -> Option<Arc<dyn Transport>> {
        debug!("transport bound");
        self.with_state(|state| state.transport.replace(transport))
    }

    /// Drop the bound transport, returning it.
    pub fn unbind_transport(&self) -> Option<Arc<dyn Transport>> {
        debug!("transport unbound");
        self.with_state(|state| state.transport.take())
    }

    pub fn has_transport(&self) -> bool {
        self.with_state(|state| state.transport.is_some())
    }

    /// Install `value` under `path` on the execution side.
    ///
    /// Returns `false` without error when the value is not transportable or
    /// no transport is bound.
    pub fn install(&self, path: &str, value: &Value) -> bool {
        let Some(source) = install_source(value) else {
            trace!(path, kind = value.kind(), "skipping non-transportable value");
            return false;
        };
        let Some(transport) = self.with_state(|state| state.transport.clone()) else {
            trace!(path, "no transport bound");
            return false;
        };
        transport.deploy(path, &source);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worklet::Callable;
    use parking_lot::Mutex;

    fn recording() -> (Arc<Mutex<Vec<(String, String)>>>, Arc<dyn Transport>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let transport: Arc<dyn Transport> = Arc::new(move |path: &str, source: &str| {
            sink.lock().push((path.to_string(), source.to_string()));
        });
        (log, transport)
    }

    #[test]
    fn scalars_and_callables_are_installed() {
        let rt = Runtime::new();
        let (log, transport) = recording();
        rt.bind_transport(transport);

        assert!(rt.install("a", &Value::from("x")));
        assert!(rt.install("b", &Value::from(2.0)));
        assert!(rt.install("c", &Value::unset()));
        assert!(rt.install(
            "d",
            &Value::from(Callable::new("function f() {}", |_| Ok(Value::unset())))
        ));

        let log = log.lock();
        assert_eq!(log[0], ("a".into(), "\"x\"".into()));
        assert_eq!(log[1], ("b".into(), "2".into()));
        assert_eq!(log[2], ("c".into(), "{}".into()));
        assert_eq!(log[3], ("d".into(), "(function f() {})".into()));
    }

    #[test]
    fn composites_are_skipped_silently() {
        let rt = Runtime::new();
        let (log, transport) = recording();
        rt.bind_transport(transport);

        assert!(!rt.install("r", &Value::record([("a", 1.0)])));
        assert!(!rt.install("s", &Value::sequence([1.0])));
        assert!(!rt.install("n", &Value::from(f64::INFINITY)));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn nothing_is_installed_without_a_transport() {
        let rt = Runtime::new();
        assert!(!rt.install("a", &Value::from(1.0)));

        let (_, transport) = recording();
        rt.bind_transport(transport);
        assert!(rt.has_transport());
        assert!(rt.unbind_transport().is_some());
        assert!(!rt.install("a", &Value::from(1.0)));
    }

    #[test]
    fn worklets_deploy_once_before_first_run() {
        let rt = Runtime::new();
        let (log, transport) = recording();
        rt.bind_transport(transport);

        let worklet = rt.worklet(Callable::new("body", |_| Ok(Value::unset())));
        assert!(log.lock().is_empty());

        worklet.invoke(&[]).unwrap();
        worklet.invoke(&[]).unwrap();

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, format!("worklet/{}", worklet.id().raw()));
        assert_eq!(log[0].1, "body");
    }
}
