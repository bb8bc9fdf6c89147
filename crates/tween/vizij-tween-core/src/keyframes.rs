//! Animation-level keyframes normalized into per-property keyframe lists.

use indexmap::IndexMap;
use tracing::warn;

use crate::easing::Easing;
use crate::params::{AnimationKeyframes, KeyframeMap, Param, TweenParams};

/// Split animation-level keyframes into ordered `TweenParams` per property.
/// `duration` is the animation duration percentage keys are spread over.
pub(crate) fn normalize(
    keyframes: AnimationKeyframes,
    duration: f64,
) -> IndexMap<String, Vec<TweenParams>> {
    match keyframes {
        AnimationKeyframes::Durations(frames) => from_durations(frames),
        AnimationKeyframes::Percentages(keys) => from_percentages(keys, duration),
    }
}

fn from_durations(frames: Vec<KeyframeMap>) -> IndexMap<String, Vec<TweenParams>> {
    let mut props: IndexMap<String, Vec<TweenParams>> = IndexMap::new();
    for frame in frames {
        for (property, value) in frame.values {
            props.entry(property).or_default().push(TweenParams {
                to: Some(Param::Value(value)),
                duration: frame.duration.map(Param::Value),
                delay: frame.delay.map(Param::Value),
                ease: frame.ease.clone(),
                ..TweenParams::default()
            });
        }
    }
    props
}

/// `"25%"` → 0.25; `"from"`/`"to"` → 0/1.
fn parse_offset(key: &str) -> Option<f64> {
    let key = key.trim();
    match key {
        "from" => return Some(0.0),
        "to" => return Some(1.0),
        _ => {}
    }
    let pct: f64 = key.strip_suffix('%')?.trim().parse().ok()?;
    (0.0..=100.0).contains(&pct).then_some(pct / 100.0)
}

fn from_percentages(
    keys: IndexMap<String, KeyframeMap>,
    duration: f64,
) -> IndexMap<String, Vec<TweenParams>> {
    let mut sorted: Vec<(f64, KeyframeMap)> = Vec::with_capacity(keys.len());
    for (key, frame) in keys {
        match parse_offset(&key) {
            Some(offset) => sorted.push((offset, frame)),
            None => warn!(key = %key, "ignoring keyframe with an invalid percentage"),
        }
    }
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Per property: frames, time covered so far, ease of the last key.
    let mut props: IndexMap<String, (Vec<TweenParams>, f64, Option<Easing>)> = IndexMap::new();
    for (offset, frame) in sorted {
        let at = offset * duration;
        for (property, value) in frame.values {
            let (frames, covered, last_ease) = props.entry(property).or_default();
            let mut tween = TweenParams {
                to: Some(Param::Value(value)),
                duration: Some(Param::Value((at - *covered).max(0.0))),
                // A key's ease shapes the segment that leaves it.
                ease: last_ease.take(),
                ..TweenParams::default()
            };
            if frames.len() == 1 {
                tween.from = frames[0].to.clone();
            }
            *covered = at;
            *last_ease = frame.ease.clone();
            frames.push(tween);
        }
    }

    props
        .into_iter()
        .map(|(property, (mut frames, _, _))| {
            let leading_is_instant = frames.len() > 1
                && matches!(&frames[0].duration, Some(Param::Value(d)) if *d == 0.0);
            if leading_is_instant {
                frames.remove(0);
            }
            (property, frames)
        })
        .collect()
}
