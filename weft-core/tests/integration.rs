//! Integration Tests for the Weft Runtime
//!
//! These tests verify that cells, mappers, registrations and the style
//! pipeline work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use weft_core::{
    AnimationDescriptor, AnimationState, Callable, Error, MapperHandle, PropertyUpdate,
    RecordingTarget, Resource, Runtime, RuntimeConfig, Scalar, Shared, Style, TargetId, Value,
};

/// A damped spring, close to critical damping.
fn spring(state: &mut AnimationState, dt: Duration) -> bool {
    let dt = dt.as_secs_f64();
    let force = -170.0 * (state.current - state.target) - 26.0 * state.velocity;
    state.velocity += force * dt;
    state.current += state.velocity * dt;

    let done = (state.current - state.target).abs() < 1e-3 && state.velocity.abs() < 1e-3;
    if done {
        state.current = state.target;
        state.velocity = 0.0;
    }
    done
}

fn counter(source: &str) -> (Arc<AtomicI32>, Callable) {
    let count = Arc::new(AtomicI32::new(0));
    let inner = count.clone();
    let callable = Callable::new(source, move |_| {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(Value::unset())
    });
    (count, callable)
}

fn opacity_of(update: &PropertyUpdate) -> Option<f64> {
    update.props.get("opacity").and_then(Scalar::as_number)
}

fn settle(rt: &Runtime, applier: &weft_core::StyleApplier) -> usize {
    let mut frames = 0;
    while applier.is_animating() {
        rt.frame().unwrap();
        frames += 1;
        assert!(frames < 500, "animation did not settle");
    }
    frames
}

/// Write 300 to the input of an animated opacity style and watch the
/// render target converge on 300 / 500.
#[test]
fn opacity_animation_end_to_end() {
    let rt = Runtime::new();
    let target = Arc::new(RecordingTarget::new());
    let applier = rt
        .style_applier("opacity", vec![Value::from(0.0)], target.clone(), |inputs| {
            let goal = inputs[0].number()? / 500.0;
            Ok(Style::new().animate("opacity", AnimationDescriptor::new(0.0, goal, spring)))
        })
        .unwrap();
    applier.attach(TargetId(0)).unwrap();
    applier.start().unwrap();
    settle(&rt, &applier);
    target.take();

    applier.inputs()[0].write(300.0).unwrap();

    let record = applier.animation("opacity").unwrap();
    assert!((record.target() - 0.6).abs() < 1e-12);
    assert_eq!(record.current(), 0.0);
    assert!(!record.is_finished());
    assert!(applier.is_animating());

    let frames = settle(&rt, &applier);

    let updates = target.take();
    assert_eq!(updates.len(), frames);
    assert!(updates.iter().all(|u| u.target == TargetId(0)));
    let values: Vec<f64> = updates.iter().filter_map(opacity_of).collect();
    assert!(values[0] > 0.0);
    assert_eq!(values.last().copied(), Some(300.0 / 500.0));

    assert!(applier.animation("opacity").unwrap().is_finished());
    assert!(applier.active_animations().is_empty());
    assert_eq!(
        applier.last_applied().get("opacity"),
        Some(&Scalar::Number(300.0 / 500.0))
    );

    applier.teardown().unwrap();
    assert_eq!(rt.stats(), Default::default());
}

/// A finished record is dropped by the next evaluation that no longer
/// animates its key.
#[test]
fn finished_animation_is_dropped_on_next_evaluation() {
    let rt = Runtime::new();
    let target = Arc::new(RecordingTarget::new());
    let applier = rt
        .style_applier("fade", vec![Value::from(true)], target.clone(), |inputs| {
            let style = Style::new().set("width", 10.0);
            Ok(match inputs[0].read()?.as_bool() {
                Some(true) => style.animate("opacity", AnimationDescriptor::new(0.0, 1.0, spring)),
                _ => style,
            })
        })
        .unwrap();
    applier.attach(TargetId(1)).unwrap();
    applier.start().unwrap();
    settle(&rt, &applier);
    assert!(applier.animation("opacity").is_some());

    target.take();
    applier.inputs()[0].write(false).unwrap();

    assert!(applier.animation("opacity").is_none());
    let updates = target.take();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].props.get("opacity"), Some(&Scalar::Unset));
    assert!(!updates[0].props.contains_key("width"));
}

/// Retargeting mid-flight continues from the current value and velocity.
#[test]
fn animation_continues_across_evaluations() {
    let rt = Runtime::new();
    let target = Arc::new(RecordingTarget::new());
    let applier = rt
        .style_applier("slide", vec![Value::from(100.0)], target.clone(), |inputs| {
            let goal = inputs[0].number()?;
            Ok(Style::new().animate("x", AnimationDescriptor::new(0.0, goal, spring)))
        })
        .unwrap();
    applier.attach(TargetId(2)).unwrap();
    applier.start().unwrap();

    for _ in 0..5 {
        rt.frame().unwrap();
    }
    let before = applier.animation("x").unwrap();
    assert!(before.current() > 0.0 && before.current() < 100.0);

    applier.inputs()[0].write(-50.0).unwrap();
    let after = applier.animation("x").unwrap();
    assert_eq!(after.current(), before.current());
    assert_eq!(after.velocity(), before.velocity());
    assert_eq!(after.target(), -50.0);

    settle(&rt, &applier);
    assert_eq!(applier.animation("x").unwrap().current(), -50.0);
}

/// The animation listener fires once all animations finish.
#[test]
fn animation_listener_fires_on_completion() {
    let rt = Runtime::new();
    let target = Arc::new(RecordingTarget::new());
    let applier = rt
        .style_applier("pop", vec![], target, |_| {
            Ok(Style::new().animate("scale", AnimationDescriptor::new(0.0, 1.0, spring)))
        })
        .unwrap();
    let fired = Arc::new(AtomicI32::new(0));
    let fired_inner = fired.clone();
    applier
        .set_animation_listener(move || {
            fired_inner.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    applier.start().unwrap();
    settle(&rt, &applier);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// Stop a mapper, release its arguments, then write to one of them.
#[test]
fn teardown_then_write_has_no_effect() {
    let rt = Runtime::new();
    let (count, body) = counter("count");
    let mut reg = rt.mapper(body, vec![Value::from(1.0)]).unwrap();
    reg.start().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    let arg = reg.args()[0].cell().clone();
    reg.stop().unwrap();
    reg.teardown().unwrap();

    let err = arg.write(2.0).unwrap_err();
    assert!(matches!(err, Error::UseAfterRelease(Resource::Cell(id)) if id == arg.id()));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(rt.stats(), Default::default());
}

/// A mapper subscribed to several written cells runs once per batch.
#[test]
fn mapper_runs_once_per_batch() {
    let rt = Runtime::new();
    let (count, body) = counter("sum");
    let mut reg = rt
        .mapper(body, vec![Value::record([("x", 1.0), ("y", 2.0)])])
        .unwrap();
    reg.start().unwrap();

    let root = reg.args()[0].clone();
    rt.batch(|| {
        root.field("x").unwrap().write(10.0).unwrap();
        root.field("y").unwrap().write(20.0).unwrap();
        root.field("x").unwrap().write(11.0).unwrap();
    })
    .unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Writes made by a mapper join the running batch, and downstream mappers
/// see the new value.
#[test]
fn writes_inside_mapper_join_the_batch() {
    let rt = Runtime::new();
    let x = rt.cell(0.0);
    let y = rt.cell(0.0);

    let y_out = y.clone();
    let producer = rt.worklet(Callable::new("producer", move |inv| {
        y_out.write(inv.arg(0)?.number()? + 1.0)?;
        Ok(Value::unset())
    }));

    let runs = Arc::new(AtomicI32::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (runs_inner, seen_inner) = (runs.clone(), seen.clone());
    let consumer = rt.worklet(Callable::new("consumer", move |inv| {
        runs_inner.fetch_add(1, Ordering::SeqCst);
        seen_inner
            .lock()
            .push((inv.arg(0)?.number()?, inv.arg(1)?.number()?));
        Ok(Value::unset())
    }));

    let x_arg = Shared::Leaf(x.clone());
    let y_arg = Shared::Leaf(y.clone());
    let _producer = rt.register_mapper(&producer, &[x_arg.clone()]).unwrap();
    let _consumer = rt.register_mapper(&consumer, &[x_arg, y_arg]).unwrap();
    runs.store(0, Ordering::SeqCst);
    seen.lock().clear();

    x.write(5.0).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().as_slice(), &[(5.0, 6.0)]);
}

/// A subscriber that already ran in the batch runs again when a later mapper
/// writes one of its inputs.
#[test]
fn mapper_writes_reach_subscribers_that_already_ran() {
    let rt = Runtime::new();
    let x = rt.cell(0.0);
    let y = rt.cell(0.0);

    let runs = Arc::new(AtomicI32::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (runs_inner, seen_inner) = (runs.clone(), seen.clone());
    let consumer = rt.worklet(Callable::new("consumer", move |inv| {
        runs_inner.fetch_add(1, Ordering::SeqCst);
        seen_inner
            .lock()
            .push((inv.arg(0)?.number()?, inv.arg(1)?.number()?));
        Ok(Value::unset())
    }));

    let y_out = y.clone();
    let producer = rt.worklet(Callable::new("producer", move |inv| {
        y_out.write(inv.arg(0)?.number()? + 1.0)?;
        Ok(Value::unset())
    }));

    let x_arg = Shared::Leaf(x.clone());
    let y_arg = Shared::Leaf(y.clone());
    let _consumer = rt.register_mapper(&consumer, &[x_arg.clone(), y_arg]).unwrap();
    let _producer = rt.register_mapper(&producer, &[x_arg]).unwrap();
    runs.store(0, Ordering::SeqCst);
    seen.lock().clear();

    x.write(5.0).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(seen.lock().as_slice(), &[(5.0, 1.0), (5.0, 6.0)]);
    assert_eq!(y.read().unwrap(), Scalar::Number(6.0));
    assert!(!rt.is_batching());
}

/// A mapper writing its own input does not re-queue itself.
#[test]
fn mapper_self_write_does_not_loop() {
    let rt = Runtime::new();
    let x = rt.cell(0.0);

    let runs = Arc::new(AtomicI32::new(0));
    let runs_inner = runs.clone();
    let x_out = x.clone();
    let bump = rt.worklet(Callable::new("bump", move |inv| {
        runs_inner.fetch_add(1, Ordering::SeqCst);
        x_out.write(inv.arg(0)?.number()? + 1.0)?;
        Ok(Value::unset())
    }));

    let _handle = rt.register_mapper(&bump, &[Shared::Leaf(x.clone())]).unwrap();
    runs.store(0, Ordering::SeqCst);

    x.write(10.0).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(x.read().unwrap(), Scalar::Number(11.0));
}

/// Mappers that keep re-triggering each other stop at the run limit, and the
/// runtime keeps working afterwards.
#[test]
fn mapper_cycle_hits_the_run_limit() {
    let rt = Runtime::with_config(RuntimeConfig {
        max_batch_runs: 50,
        ..RuntimeConfig::default()
    });
    let x = rt.cell(0.0);
    let y = rt.cell(0.0);

    let y_out = y.clone();
    let forward = rt.worklet(Callable::new("forward", move |inv| {
        y_out.write(inv.arg(0)?.number()? + 1.0)?;
        Ok(Value::unset())
    }));
    let x_out = x.clone();
    let back = rt.worklet(Callable::new("back", move |inv| {
        x_out.write(inv.arg(0)?.number()? + 1.0)?;
        Ok(Value::unset())
    }));

    let _forward = rt.register_mapper(&forward, &[Shared::Leaf(x.clone())]).unwrap();
    let _back = rt.register_mapper(&back, &[Shared::Leaf(y.clone())]).unwrap();

    let err = x.write(0.0).unwrap_err();
    assert!(matches!(err, Error::BatchLimit { runs: 50 }));
    assert!(!rt.is_batching());

    let (count, body) = counter("after");
    let z = rt.cell(0.0);
    let _after = rt
        .register_mapper(&rt.worklet(body), &[Shared::Leaf(z.clone())])
        .unwrap();
    z.write(1.0).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// A mapper that stops a queued sibling prevents the sibling's run.
#[test]
fn stop_inside_evaluation_skips_queued_mapper() {
    let rt = Runtime::new();
    let cell = rt.cell(0.0);
    let arg = [Shared::Leaf(cell.clone())];

    let victim: Arc<Mutex<Option<MapperHandle>>> = Arc::new(Mutex::new(None));
    let victim_inner = victim.clone();
    let stopper = rt.worklet(Callable::new("stopper", move |_| {
        if let Some(handle) = victim_inner.lock().as_ref() {
            handle.stop();
        }
        Ok(Value::unset())
    }));
    let (count, body) = counter("victim");
    let victim_body = rt.worklet(body);

    let _stopper = rt.register_mapper(&stopper, &arg).unwrap();
    let handle = rt.register_mapper(&victim_body, &arg).unwrap();
    *victim.lock() = Some(handle.clone());
    assert_eq!(count.load(Ordering::SeqCst), 1);

    cell.write(1.0).unwrap();

    assert!(!handle.is_active());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Start and stop can be called any number of times.
#[test]
fn start_and_stop_are_idempotent() {
    let rt = Runtime::new();
    let (count, body) = counter("count");
    let mut reg = rt.mapper(body, vec![Value::from(0.0)]).unwrap();

    reg.start().unwrap();
    reg.start().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(rt.stats().mappers, 1);

    reg.stop().unwrap();
    reg.stop().unwrap();
    assert_eq!(rt.stats().mappers, 0);

    reg.args()[0].write(1.0).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Packaging and unpackaging a value gives the value back.
#[test]
fn packaged_value_round_trips() {
    let rt = Runtime::new();
    let value = Value::record([
        ("name", Value::from("box")),
        ("size", Value::sequence([1.0, 2.0, 3.0])),
        ("visible", Value::from(true)),
        ("parent", Value::unset()),
    ]);

    let mut pkg = rt.create(value.clone()).unwrap();
    assert_eq!(pkg.root().unwrap().to_value().unwrap(), value);

    pkg.release().unwrap();
    pkg.release().unwrap();
    assert_eq!(rt.stats().cells, 0);
}

/// Worklets deploy through the bound transport before their first run.
#[test]
fn transport_receives_each_worklet_once() {
    let config = RuntimeConfig::from_json(r#"{ "deploy_prefix": "ui" }"#).unwrap();
    let rt = Runtime::with_config(config);
    let deployed = Arc::new(Mutex::new(Vec::new()));
    let sink = deployed.clone();
    rt.bind_transport(Arc::new(move |path: &str, source: &str| {
        sink.lock().push((path.to_owned(), source.to_owned()));
    }));

    let (_, body) = counter("tick");
    let mut reg = rt.repeat(body, vec![]).unwrap();
    reg.start().unwrap();
    rt.frame().unwrap();
    rt.frame().unwrap();

    let id = reg.body().id().raw();
    assert_eq!(
        deployed.lock().as_slice(),
        &[(format!("ui/{id}"), "tick".to_owned())]
    );

    assert!(rt.install("ui/answer", &Value::from(42)));
    assert!(!rt.install("ui/list", &Value::sequence([1.0])));
    assert_eq!(deployed.lock().len(), 2);
}

/// Event handlers see their context arguments and the payload.
#[test]
fn event_handler_dispatch() {
    let rt = Runtime::new();
    let total = rt.cell(0.0);
    let body = Callable::new("accumulate", |inv| {
        let total = inv.arg(0)?;
        let delta = inv
            .event()
            .and_then(Value::as_scalar)
            .and_then(Scalar::as_number)
            .unwrap_or(0.0);
        total.write(total.number()? + delta)?;
        Ok(Value::unset())
    });
    let mut reg = rt
        .event_handler(body, vec![Value::Shared(Shared::Leaf(total.clone()))])
        .unwrap();

    reg.dispatch(1.0).unwrap();
    reg.start().unwrap();
    reg.dispatch(2.0).unwrap();
    reg.dispatch(3.0).unwrap();

    assert_eq!(total.read().unwrap(), Scalar::Number(5.0));
    reg.teardown().unwrap();
    assert!(total.is_alive());
}
