use serde_json::json;
use vizij_tween_core::{
    create_spring, sequence, AnimationParams, Composition, Config, CoreEvent, Curve, Direction,
    Easing, EngineHandle, ManualFrames, ManualTimeSource, PropertyStore, SequenceParams,
    SpringParams, TargetId, Timer, TweenParams, Value,
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

fn animate(engine: &EngineHandle, target: TargetId, params: AnimationParams) -> Timer {
    engine.create_animation(&[target], params.autoplay(false))
}

#[test]
fn endpoints_are_exact_in_every_mode() {
    let (engine, store) = engine();
    let modes = [
        (TargetId(0), Composition::Replace),
        (TargetId(1), Composition::None),
        (TargetId(2), Composition::Blend),
    ];
    for (target, mode) in modes {
        store.set(target, "x", Value::Number(3.1));
        // Default ease on purpose: curved in between, exact at the ends.
        let timer = animate(
            &engine,
            target,
            AnimationParams::new()
                .prop("x", TweenParams::to(37.3).composition(mode))
                .duration(1000.0),
        );
        timer.seek(1000.0);
        assert_eq!(store.get(target, "x"), Some(Value::Number(37.3)), "{mode:?}");
        timer.seek(0.0);
        approx(store.number(target, "x").unwrap(), 3.1, 1e-9);
    }
}

#[test]
fn seeking_is_deterministic() {
    let sample = || {
        let (engine, store) = engine();
        let target = TargetId(0);
        let timer = animate(
            &engine,
            target,
            AnimationParams::new()
                .prop("x", (0.0, 250.0))
                .duration(800.0)
                .ease(Easing::Curve(Curve::Elastic(1.0, 0.3), Direction::Out)),
        );
        [640.0, 10.0, 400.0, 799.0, 200.0]
            .iter()
            .map(|t| {
                timer.seek(*t);
                store.number(target, "x").unwrap()
            })
            .collect::<Vec<f64>>()
    };
    assert_eq!(sample(), sample());
}

#[test]
fn units_keep_their_suffix() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop("width", ("0px", "100px"))
            .prop("left", "50%")
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    timer.seek(250.0);
    assert_eq!(
        store.get(target, "width"),
        Some(Value::Unit {
            number: 25.0,
            unit: "px".into()
        })
    );
    // A unitless start takes the destination's unit.
    assert_eq!(
        store.get(target, "left"),
        Some(Value::Unit {
            number: 12.5,
            unit: "%".into()
        })
    );
}

#[test]
fn colors_interpolate_per_channel() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop("fill", ("#000000", "rgba(255, 255, 255, 0.5)"))
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    timer.seek(500.0);
    assert_eq!(
        store.get(target, "fill"),
        Some(Value::Color([128.0, 128.0, 128.0, 0.75]))
    );
    timer.seek(1000.0);
    assert_eq!(
        store.get(target, "fill"),
        Some(Value::Color([255.0, 255.0, 255.0, 0.5]))
    );
}

#[test]
fn templates_interpolate_each_token() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop(
                "transform",
                ("translate(0px, 0px)", "translate(10px, 20px)"),
            )
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    timer.seek(500.0);
    assert_eq!(
        store.get(target, "transform"),
        Some(Value::Complex("translate(5px, 10px)".into()))
    );
}

#[test]
fn relative_values_resolve_against_the_current_value() {
    let (engine, store) = engine();
    for (i, (raw, expected)) in [("+=5", 15.0), ("-=4", 6.0), ("*=3", 30.0)]
        .into_iter()
        .enumerate()
    {
        let target = TargetId(i as u32);
        store.set(target, "x", Value::Number(10.0));
        let timer = animate(
            &engine,
            target,
            AnimationParams::new().prop("x", raw).duration(100.0),
        );
        timer.seek(100.0);
        assert_eq!(store.number(target, "x"), Some(expected), "{raw}");
    }
}

#[test]
fn modifier_runs_after_interpolation() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop("x", TweenParams::to(10.0).from(0.0).modifier(f64::round))
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    timer.seek(250.0);
    assert_eq!(store.number(target, "x"), Some(3.0));
}

#[test]
fn malformed_values_fall_back_to_zero() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop("x", ("not a number", 10.0))
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    timer.seek(500.0);
    assert_eq!(store.number(target, "x"), Some(5.0));
}

#[test]
fn property_keyframes_chain_end_to_start() {
    let (engine, store) = engine();
    let target = TargetId(0);
    store.set(target, "y", Value::Number(0.0));
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop(
                "y",
                vec![
                    TweenParams::to(50.0).duration(500.0),
                    TweenParams::to(0.0).duration(500.0),
                ],
            )
            .ease(Easing::Linear),
    );
    assert_eq!(timer.duration().unwrap(), 1000.0);
    for (t, expected) in [(250.0, 25.0), (750.0, 25.0), (500.0, 50.0), (1000.0, 0.0)] {
        timer.seek(t);
        approx(store.number(target, "y").unwrap(), expected, 1e-9);
    }
}

#[test]
fn implicit_keyframe_durations_share_the_remainder() {
    let (engine, store) = engine();
    let target = TargetId(0);
    store.set(target, "y", Value::Number(0.0));
    let timer = animate(
        &engine,
        target,
        AnimationParams::new()
            .prop(
                "y",
                vec![
                    TweenParams::to(10.0),
                    TweenParams::to(20.0).duration(600.0),
                    TweenParams::to(0.0),
                ],
            )
            .duration(1000.0)
            .ease(Easing::Linear),
    );
    assert_eq!(timer.duration().unwrap(), 1000.0);
    timer.seek(200.0);
    approx(store.number(target, "y").unwrap(), 10.0, 1e-9);
    timer.seek(800.0);
    approx(store.number(target, "y").unwrap(), 20.0, 1e-9);
}

#[test]
fn percentage_keyframes_spread_over_the_duration() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let params: AnimationParams = serde_json::from_value(json!({
        "keyframes": {
            "100%": { "y": 0 },
            "0%": { "y": 0 },
            "50%": { "y": 100 }
        },
        "duration": 1000,
        "ease": "linear"
    }))
    .unwrap();
    let timer = animate(&engine, target, params);
    assert_eq!(timer.duration().unwrap(), 1000.0);
    for (t, expected) in [(250.0, 50.0), (500.0, 100.0), (750.0, 50.0)] {
        timer.seek(t);
        approx(store.number(target, "y").unwrap(), expected, 1e-9);
    }
}

#[test]
fn duration_keyframes_apply_per_step_timing() {
    let (engine, store) = engine();
    let target = TargetId(0);
    store.set(target, "x", Value::Number(0.0));
    let params: AnimationParams = serde_json::from_value(json!({
        "keyframes": [
            { "x": 10, "duration": 200 },
            { "x": 30, "duration": 300 }
        ],
        "ease": "linear"
    }))
    .unwrap();
    let timer = animate(&engine, target, params);
    assert_eq!(timer.duration().unwrap(), 500.0);
    timer.seek(100.0);
    approx(store.number(target, "x").unwrap(), 5.0, 1e-9);
    timer.seek(400.0);
    approx(store.number(target, "x").unwrap(), 10.0 + 20.0 * (200.0 / 300.0), 1e-9);
}

#[test]
fn staggered_delays_offset_each_target() {
    let (engine, store) = engine();
    let targets = [TargetId(0), TargetId(1), TargetId(2)];
    for t in targets {
        store.set(t, "x", Value::Number(0.0));
    }
    let timer = engine.create_animation(
        &targets,
        AnimationParams::new()
            .prop("x", 100.0)
            .duration(1000.0)
            .delay(sequence(100.0, SequenceParams::default()))
            .ease(Easing::Linear)
            .autoplay(false),
    );
    assert_eq!(timer.duration().unwrap(), 1200.0);
    timer.seek(600.0);
    let values: Vec<f64> = targets
        .iter()
        .map(|t| store.number(*t, "x").unwrap())
        .collect();
    for (value, expected) in values.iter().zip([60.0, 50.0, 40.0]) {
        approx(*value, expected, 1e-9);
    }
}

#[test]
fn spring_ease_sets_the_duration() {
    let (engine, store) = engine();
    let target = TargetId(0);
    let spring = create_spring(SpringParams::default());
    let timer = animate(
        &engine,
        target,
        AnimationParams::new().prop(
            "x",
            TweenParams::to(1.0).from(0.0).ease(Easing::Spring(spring)),
        ),
    );
    approx(timer.duration().unwrap(), spring.settling_duration(), 1e-6);
    timer.seek(timer.duration().unwrap());
    assert_eq!(store.number(target, "x"), Some(1.0));
}

#[test]
fn empty_target_list_is_a_warned_no_op() {
    let (engine, store) = engine();
    let timer = engine.create_animation(&[], AnimationParams::new().prop("x", 10.0));
    assert!(timer.duration().unwrap() < 1e-9);
    assert!(store.is_empty());
    let warned = engine.with(|e| {
        e.outputs()
            .events
            .iter()
            .any(|ev| matches!(ev, CoreEvent::Warning { .. }))
    });
    assert!(warned);
}
