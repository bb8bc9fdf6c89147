use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use vizij_test_fixtures::animations;
use vizij_tween_core::{
    sequence, AnimationParams, Config, EngineHandle, Loops, ManualFrames, ManualTimeSource,
    PropertyStore, SequenceParams, TargetId, TweenParams,
};

fn engine() -> EngineHandle {
    EngineHandle::with_parts(
        Config::default(),
        Box::new(PropertyStore::new()),
        Box::new(ManualTimeSource::new(0.0)),
        Box::new(ManualFrames::default()),
    )
}

fn many_targets(engine: &EngineHandle, count: u32) {
    let targets: Vec<TargetId> = (0..count).map(TargetId).collect();
    let _ = engine.create_animation(
        &targets,
        AnimationParams::new()
            .prop("x", 100.0)
            .prop("opacity", (0.0, 1.0))
            .prop("transform", ("rotate(0deg)", "rotate(360deg)"))
            .delay(sequence(5.0, SequenceParams::default()))
            .duration(1000.0)
            .loops(Loops::Infinite),
    );
}

fn step_bench(c: &mut Criterion) {
    c.bench_function("update-500-targets", |b| {
        let engine = engine();
        many_targets(&engine, 500);
        let mut t = 0.0;
        b.iter(|| {
            t += 16.0;
            black_box(engine.update_at(t));
        });
    });

    c.bench_function("seek-fixtures", |b| {
        let engine = engine();
        let timers: Vec<_> = animations::keys()
            .iter()
            .filter_map(|name| animations::load::<AnimationParams>(name).ok())
            .map(|params| engine.create_animation(&[TargetId(0)], params))
            .collect();
        let mut t = 0.0;
        b.iter(|| {
            t = (t + 37.0) % 1600.0;
            for timer in &timers {
                timer.seek(black_box(t));
            }
        });
    });

    c.bench_function("compose-replace-chain", |b| {
        b.iter_batched(
            engine,
            |engine| {
                for i in 0..64 {
                    let _ = engine.create_animation(
                        &[TargetId(0)],
                        AnimationParams::new()
                            .prop("x", TweenParams::to(i as f64).delay(i as f64 * 10.0))
                            .duration(500.0)
                            .autoplay(false),
                    );
                }
                engine
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, step_bench);
criterion_main!(benches);
