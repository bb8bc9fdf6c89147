//! Animation expansion: declarative parameters to composed tweens.
//!
//! Every (target, property) pair becomes an ordered run of tweens whose
//! windows chain end to start. Each tween is composed into its property's
//! sibling or additive chain as soon as it is created, so later keyframes
//! and later animations see it as a predecessor.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::MIN_VALUE;
use crate::composition::AdditiveLookup;
use crate::easing::Easing;
use crate::engine::Engine;
use crate::ids::{PropertyKey, TargetId, TickableId};
use crate::keyframes;
use crate::outputs::CoreEvent;
use crate::params::{AnimationParams, Composition, Modifier, Param, TweenParams};
use crate::timer::{normalize_time, Tickable, TimerState};
use crate::tween::{Link, Tween};
use crate::value::{decompose, Decomposed, ValueType};

/// Animation-level values each keyframe falls back to.
struct FrameDefaults {
    duration: f64,
    delay: f64,
    ease: Easing,
    composition: Composition,
    modifier: Option<Modifier>,
}

/// Where one target slot sits in the target list.
#[derive(Copy, Clone)]
struct Slot {
    target: TargetId,
    index: usize,
    total: usize,
}

impl Slot {
    fn resolve<T: Clone>(&self, param: &Option<Param<T>>) -> Option<T> {
        param
            .as_ref()
            .map(|p| p.resolve(self.target, self.index, self.total))
    }
}

fn decomposed_to(tween: &Tween) -> Decomposed {
    Decomposed {
        value_type: tween.value_type,
        number: tween.to_number,
        unit: tween.unit.clone(),
        numbers: tween.to_numbers.clone(),
        strings: tween.strings.clone(),
        operator: None,
    }
}

fn decomposed_lookup(lookup: &AdditiveLookup) -> Decomposed {
    Decomposed {
        value_type: lookup.value_type,
        number: lookup.target_number,
        unit: lookup.unit.clone(),
        numbers: lookup.target_numbers.clone(),
        strings: lookup.strings.clone(),
        operator: None,
    }
}

/// Bring `from` onto the type of `to`.
fn reconcile(from: &mut Decomposed, to: &mut Decomposed) {
    use ValueType::*;
    match (from.value_type, to.value_type) {
        (Number, Unit) => {
            from.value_type = Unit;
            from.unit = to.unit.clone();
        }
        (Unit, Number) => {
            to.value_type = Unit;
            to.unit = from.unit.clone();
        }
        (Unit, Unit) if from.unit != to.unit => from.unit = to.unit.clone(),
        (Color, Color) | (Complex, Complex) => {}
        (_, Color) => {
            from.value_type = Color;
            from.numbers = to.numbers.clone();
            from.number = to.number;
        }
        (_, Complex) => {
            if from.numbers.is_empty() {
                from.numbers.push(from.number);
            }
            from.value_type = Complex;
            from.unit = None;
        }
        (Color | Complex, Number | Unit) => {
            from.value_type = to.value_type;
            from.unit = to.unit.clone();
            from.numbers.clear();
            from.strings.clear();
        }
        _ => {}
    }
    if to.value_type == Complex {
        from.strings = to.strings.clone();
        from.numbers.resize(to.numbers.len(), 0.0);
    }
}

impl Engine {
    /// Expand `params` over `targets`, compose the tweens and run the init
    /// sequence. An empty target list yields a zero-duration no-op.
    pub fn create_animation(&mut self, targets: &[TargetId], params: AnimationParams) -> TickableId {
        let offset = self.now();
        let defaults = self.cfg.defaults.clone();
        let AnimationParams {
            delay,
            duration,
            ease,
            composition,
            modifier,
            keyframes,
            playback,
            callbacks,
            properties,
        } = params;

        let placeholder = TimerState::new(0.0, MIN_VALUE, &playback, &defaults, offset);
        let id = self.tickables.insert(Tickable::new(placeholder, callbacks));

        if targets.is_empty() {
            warn!("animation created without targets; it will do nothing");
            self.outputs.push_event(CoreEvent::Warning {
                message: "animation has no targets".to_string(),
            });
            self.init(id);
            return id;
        }

        let total = targets.len();
        let first = Slot {
            target: targets[0],
            index: 0,
            total,
        };
        let mut props: IndexMap<String, Vec<TweenParams>> = match keyframes {
            Some(k) => keyframes::normalize(k, first.resolve(&duration).unwrap_or(defaults.duration)),
            None => IndexMap::new(),
        };
        for (name, value) in properties {
            props.insert(name, value.into_keyframes());
        }

        let mut min_start = f64::INFINITY;
        let mut max_end = 0.0_f64;
        for (index, target) in targets.iter().copied().enumerate() {
            let slot = Slot {
                target,
                index,
                total,
            };
            let frame_defaults = FrameDefaults {
                duration: slot.resolve(&duration).unwrap_or(defaults.duration),
                delay: slot.resolve(&delay).unwrap_or(defaults.delay),
                ease: ease.clone().unwrap_or_else(|| defaults.ease.clone()),
                composition: composition.unwrap_or(defaults.composition),
                modifier: modifier.clone(),
            };
            for (property, frames) in &props {
                if let Some((start, end)) =
                    self.expand_property(id, slot, property, frames, &frame_defaults, offset)
                {
                    min_start = min_start.min(start);
                    max_end = max_end.max(end);
                }
            }
        }

        let anim_delay = if min_start.is_finite() { min_start } else { 0.0 };
        let iteration_duration = max_end - anim_delay;
        if let Some(tickable) = self.tickables.get_mut(id) {
            for tween_id in &tickable.tweens {
                if let Some(tween) = self.tweens.get_mut(*tween_id) {
                    // The animation now owns the shared part of a leading delay.
                    if tween.start_time == tween.delay {
                        tween.delay -= anim_delay;
                    }
                    tween.start_time -= anim_delay;
                }
            }
            tickable.state =
                TimerState::new(anim_delay, iteration_duration, &playback, &defaults, offset);
            debug!(
                ?id,
                tweens = tickable.tweens.len(),
                delay = anim_delay,
                iteration_duration,
                "animation created"
            );
        }
        self.init(id);
        id
    }

    /// Create and compose the tweens of one property on one target. Returns
    /// the first start and last end, both relative to the animation offset.
    fn expand_property(
        &mut self,
        parent: TickableId,
        slot: Slot,
        property: &str,
        frames: &[TweenParams],
        defaults: &FrameDefaults,
        offset: f64,
    ) -> Option<(f64, f64)> {
        if frames.is_empty() {
            return None;
        }
        let key = PropertyKey::new(slot.target, property);

        let explicit: f64 = frames.iter().filter_map(|f| slot.resolve(&f.duration)).sum();
        let implicit = frames.iter().filter(|f| f.duration.is_none()).count();
        let shared_duration = if implicit > 0 {
            ((defaults.duration - explicit) / implicit as f64).max(0.0)
        } else {
            0.0
        };

        let current = self.io.read(slot.target, property);
        let current_parts = current
            .as_ref()
            .map(Decomposed::from)
            .unwrap_or_else(|| Decomposed::number(0.0));
        if let (Some(value), Some(tickable)) = (&current, self.tickables.get_mut(parent)) {
            if !tickable.originals.iter().any(|(k, _)| k == &key) {
                tickable.originals.push((key.clone(), value.clone()));
            }
        }

        let mut first_start = None;
        let mut prev_end = 0.0;
        let mut prev_to: Option<Decomposed> = None;
        for (k, frame) in frames.iter().enumerate() {
            let ease = frame.ease.clone().unwrap_or_else(|| defaults.ease.clone());
            let delay = slot
                .resolve(&frame.delay)
                .unwrap_or(if k == 0 { defaults.delay } else { 0.0 })
                .max(0.0);
            let duration = slot
                .resolve(&frame.duration)
                .or_else(|| ease.intrinsic_duration())
                .unwrap_or(shared_duration)
                .max(0.0);
            let composition = frame.composition.unwrap_or(defaults.composition);
            let modifier = frame.modifier.clone().or_else(|| defaults.modifier.clone());
            let start = prev_end + delay;
            let absolute_start = offset + start;

            let predecessor = match composition {
                Composition::None => None,
                _ => self
                    .compositor
                    .predecessor(&self.tweens, &key, absolute_start)
                    .and_then(|p| self.tweens.get(p)),
            };
            let mut from = match slot.resolve(&frame.from) {
                Some(raw) => decompose(&raw),
                None => match (&prev_to, predecessor) {
                    (Some(prev), _) => prev.clone(),
                    (None, Some(p)) => decomposed_to(p),
                    (None, None) => current_parts.clone(),
                },
            };
            from.resolve_relative(&current_parts);
            let mut to = match slot.resolve(&frame.to) {
                Some(raw) => decompose(&raw),
                None => current_parts.clone(),
            };
            if to.operator.is_some() {
                let base = match composition {
                    Composition::Blend => self
                        .compositor
                        .lookup(&key)
                        .map(decomposed_lookup)
                        .unwrap_or_else(|| from.clone()),
                    _ => from.clone(),
                };
                to.resolve_relative(&base);
            }
            reconcile(&mut from, &mut to);

            let span = normalize_time(duration);
            let tween = Tween {
                parent,
                key: key.clone(),
                value_type: to.value_type,
                from_number: from.number,
                to_number: to.number,
                from_numbers: from.numbers.clone(),
                to_numbers: to.numbers.clone(),
                unit: to.unit.clone(),
                strings: to.strings.clone(),
                number: from.number,
                numbers: from.numbers.clone(),
                start_time: start,
                delay,
                update_duration: span,
                change_duration: span,
                absolute_start_time: absolute_start,
                current_time: 0.0,
                ease,
                composition,
                modifier,
                is_overlapped: false,
                is_overridden: false,
                cancelled: false,
                sibling: Link::default(),
                additive: Link::default(),
            };
            let tween_id = self.tweens.insert(tween);
            if let Some(tickable) = self.tickables.get_mut(parent) {
                tickable.tweens.push(tween_id);
            }

            let mut touched = Vec::new();
            if composition == Composition::Replace {
                touched.extend(
                    self.compositor
                        .override_later(&mut self.tweens, &key, absolute_start),
                );
            }
            touched.extend(
                self.compositor
                    .compose(&mut self.tweens, &self.tickables, tween_id),
            );
            self.cancel_overridden_parents(touched);

            first_start.get_or_insert(start);
            prev_end = start + duration;
            prev_to = Some(to);
        }
        first_start.map(|s| (s, prev_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_and_unit_mix_becomes_unit() {
        let mut from = Decomposed::number(0.0);
        let mut to = Decomposed::unit(10.0, "px");
        reconcile(&mut from, &mut to);
        assert_eq!(from.value_type, ValueType::Unit);
        assert_eq!(from.unit.as_deref(), Some("px"));

        let mut from = Decomposed::unit(5.0, "em");
        let mut to = Decomposed::number(1.0);
        reconcile(&mut from, &mut to);
        assert_eq!(to.value_type, ValueType::Unit);
        assert_eq!(to.unit.as_deref(), Some("em"));
    }

    #[test]
    fn non_color_from_takes_target_color() {
        let mut from = Decomposed::number(0.0);
        let mut to = Decomposed::color([255.0, 0.0, 0.0, 1.0]);
        reconcile(&mut from, &mut to);
        assert_eq!(from.value_type, ValueType::Color);
        assert_eq!(from.numbers, to.numbers);
    }

    #[test]
    fn complex_from_is_padded_to_template() {
        let mut from = Decomposed::number(1.0);
        let mut to = decompose(&"translate(10px, 20px)".into());
        reconcile(&mut from, &mut to);
        assert_eq!(from.value_type, ValueType::Complex);
        assert_eq!(from.numbers, vec![1.0, 0.0]);
        assert_eq!(from.strings, to.strings);
    }
}
