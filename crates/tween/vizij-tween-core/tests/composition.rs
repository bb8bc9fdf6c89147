use vizij_tween_core::{
    AnimationParams, Composition, Config, CoreEvent, Easing, EngineHandle, ManualFrames,
    ManualTimeSource, PropertyKey, PropertyStore, TargetId, Timer, TweenId, TweenParams, Value,
};

fn approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn engine() -> (EngineHandle, PropertyStore) {
    let store = PropertyStore::new();
    let handle = EngineHandle::with_parts(
        Config::default(),
        Box::new(store.clone()),
        Box::new(ManualTimeSource::new(0.0)),
        Box::new(ManualFrames::default()),
    );
    (handle, store)
}

fn linear(engine: &EngineHandle, target: TargetId, tween: TweenParams) -> Timer {
    engine.create_animation(
        &[target],
        AnimationParams::new()
            .prop("x", tween.ease(Easing::Linear))
            .autoplay(false),
    )
}

fn tween_ids(engine: &EngineHandle, timer: &Timer) -> Vec<TweenId> {
    engine.with(|e| e.tickable(timer.id()).map(|t| t.tweens.clone()).unwrap())
}

#[test]
fn later_animation_wins_inside_the_overlap() {
    let (engine, store) = engine();
    let target = TargetId(0);
    store.set(target, "x", Value::Number(0.0));

    let a = linear(&engine, target, TweenParams::to(10.0).duration(1000.0));
    let b = linear(
        &engine,
        target,
        TweenParams::to(20.0).duration(1000.0).delay(500.0),
    );

    // B inherits A's destination as its start.
    for t in [550.0, 700.0, 850.0, 999.0] {
        b.seek(t - 500.0);
        let expected = 10.0 + 10.0 * ((t - 500.0) / 1000.0);
        approx(store.number(target, "x").unwrap(), expected, 1e-9);
        a.seek(t);
        approx(store.number(target, "x").unwrap(), expected, 1e-9);
    }

    // Before the overlap A still drives the property.
    a.seek(250.0);
    approx(store.number(target, "x").unwrap(), 2.5, 1e-9);

    let a_tween = tween_ids(&engine, &a)[0];
    let truncated = engine.with(|e| e.tween(a_tween).map(|t| (t.change_duration, t.is_overlapped)));
    assert_eq!(truncated, Some((500.0, true)));
}

#[test]
fn equal_start_overrides_and_cancels_the_older_animation() {
    let (engine, store) = engine();
    let target = TargetId(0);
    store.set(target, "x", Value::Number(0.0));

    let a = linear(&engine, target, TweenParams::to(10.0).duration(1000.0));
    let b = linear(&engine, target, TweenParams::to(20.0).duration(1000.0));

    assert!(a.is_cancelled().unwrap());
    assert!(!b.is_cancelled().unwrap());
    let a_tween = tween_ids(&engine, &a)[0];
    assert_eq!(engine.with(|e| e.tween(a_tween).map(|t| t.is_overridden)), Some(true));
    let cancelled = engine.with(|e| {
        e.outputs()
            .events
            .iter()
            .any(|ev| matches!(ev, CoreEvent::Cancelled { tickable } if *tickable == a.id()))
    });
    assert!(cancelled);

    b.seek(500.0);
    approx(store.number(target, "x").unwrap(), 15.0, 1e-9);
}

#[test]
fn blended_relative_offsets_sum() {
    let (engine, store) = engine();
    let target = TargetId(3);
    store.set(target, "x", Value::Number(0.0));

    let nudge = || {
        TweenParams::to("+=50")
            .duration(1000.0)
            .composition(Composition::Blend)
    };
    let a = linear(&engine, target, nudge());
    let b = linear(&engine, target, nudge());

    a.seek(500.0);
    b.seek(500.0);
    assert_eq!(store.get(target, "x"), Some(Value::Number(50.0)));

    a.seek(1000.0);
    b.seek(1000.0);
    assert_eq!(store.get(target, "x"), Some(Value::Number(100.0)));

    let key = PropertyKey::new(target, "x");
    let chain = engine.with(|e| e.sibling_order(&key));
    assert!(chain.is_empty());
}

#[test]
fn blend_does_not_disturb_replace_siblings() {
    let (engine, store) = engine();
    let target = TargetId(4);
    store.set(target, "x", Value::Number(0.0));

    let base = linear(&engine, target, TweenParams::to(100.0).duration(1000.0));
    let _nudge = linear(
        &engine,
        target,
        TweenParams::to("+=10")
            .duration(1000.0)
            .composition(Composition::Blend),
    );
    assert!(!base.is_cancelled().unwrap());
    let base_tween = tween_ids(&engine, &base)[0];
    let change = engine.with(|e| e.tween(base_tween).map(|t| t.change_duration));
    assert_eq!(change, Some(1000.0));
}

#[test]
fn independent_tweens_ignore_each_other() {
    let (engine, store) = engine();
    let target = TargetId(5);
    store.set(target, "x", Value::Number(0.0));

    let free = |to: f64| {
        TweenParams::to(to)
            .from(0.0)
            .duration(1000.0)
            .composition(Composition::None)
    };
    let a = linear(&engine, target, free(10.0));
    let b = linear(&engine, target, free(20.0));
    assert!(!a.is_cancelled().unwrap());

    b.seek(500.0);
    approx(store.number(target, "x").unwrap(), 10.0, 1e-9);
    a.seek(500.0);
    approx(store.number(target, "x").unwrap(), 5.0, 1e-9);
}

#[test]
fn revival_restores_the_sibling_chain() {
    let (engine, store) = engine();
    let target = TargetId(6);
    store.set(target, "x", Value::Number(0.0));
    let key = PropertyKey::new(target, "x");

    let a = linear(&engine, target, TweenParams::to(10.0).duration(1000.0));
    let b = linear(
        &engine,
        target,
        TweenParams::to(20.0).duration(1000.0).delay(500.0),
    );
    let before = engine.with(|e| e.sibling_order(&key));
    assert_eq!(before.len(), 2);
    let a_tween = tween_ids(&engine, &a)[0];
    let a_change = engine.with(|e| e.tween(a_tween).map(|t| t.change_duration));

    b.cancel();
    assert!(b.is_cancelled().unwrap());
    // Cancellation only flags; the links stay.
    assert_eq!(engine.with(|e| e.sibling_order(&key)), before);

    b.reset().resume();
    assert!(!b.is_cancelled().unwrap());
    assert_eq!(engine.with(|e| e.sibling_order(&key)), before);
    assert_eq!(
        engine.with(|e| e.tween(a_tween).map(|t| t.change_duration)),
        a_change
    );

    b.pause().seek(250.0);
    approx(store.number(target, "x").unwrap(), 12.5, 1e-9);
}

#[test]
fn revert_restores_captured_values_and_frees() {
    let (engine, store) = engine();
    let target = TargetId(7);
    store.set(target, "x", Value::Number(5.0));

    let a = linear(&engine, target, TweenParams::to(105.0).duration(1000.0));
    a.seek(500.0);
    approx(store.number(target, "x").unwrap(), 55.0, 1e-9);

    let count = engine.with(|e| e.tickable_count());
    a.revert();
    assert_eq!(store.get(target, "x"), Some(Value::Number(5.0)));
    assert_eq!(engine.with(|e| e.tickable_count()), count - 1);
    assert!(a.view().is_err());
    let reverted = engine.with(|e| {
        e.outputs()
            .events
            .iter()
            .any(|ev| matches!(ev, CoreEvent::Reverted { .. }))
    });
    assert!(reverted);
    assert!(engine
        .with(|e| e.sibling_order(&PropertyKey::new(target, "x")))
        .is_empty());
}

#[test]
fn delayed_sibling_takes_over_where_the_predecessor_stops() {
    let (engine, store) = engine();
    let target = TargetId(8);
    store.set(target, "x", Value::Number(0.0));
    store.set(target, "z", Value::Number(0.0));

    let a = linear(&engine, target, TweenParams::to(10.0).duration(1000.0));
    // The undelayed `z` keeps the animation's own delay at zero, so the `x`
    // tween carries its 500ms delay itself.
    let b = engine.create_animation(
        &[target],
        AnimationParams::new()
            .prop("x", TweenParams::to(20.0).delay(500.0))
            .prop("z", 5.0)
            .duration(1000.0)
            .ease(Easing::Linear)
            .autoplay(false),
    );

    let a_tween = tween_ids(&engine, &a)[0];
    let state = engine.with(|e| {
        e.tween(a_tween)
            .map(|t| (t.change_duration, t.is_overlapped, t.is_overridden))
    });
    assert_eq!(state, Some((500.0, true, false)));
    assert!(!a.is_cancelled().unwrap());

    for (t, expected) in [(600.0, 11.0), (750.0, 12.5), (900.0, 14.0)] {
        b.seek(t);
        approx(store.number(target, "x").unwrap(), expected, 1e-9);
    }

    a.seek(400.0);
    approx(store.number(target, "x").unwrap(), 4.0, 1e-9);
}

#[test]
fn blend_lookup_is_dropped_with_its_last_tween() {
    let (engine, store) = engine();
    let target = TargetId(9);
    store.set(target, "x", Value::Number(0.0));
    let key = PropertyKey::new(target, "x");

    let nudge = linear(
        &engine,
        target,
        TweenParams::to("+=10")
            .duration(1000.0)
            .composition(Composition::Blend),
    );
    nudge.seek(500.0);
    assert!(engine.with(|e| e.additive_lookup(&key).is_some()));

    nudge.revert();
    store.set(TargetId(10), "x", Value::Number(0.0));
    let other = linear(&engine, TargetId(10), TweenParams::to(1.0).duration(100.0));
    other.seek(50.0);
    assert!(engine.with(|e| e.additive_lookup(&key).is_none()));
}
