//! Render/tick evaluation.
//!
//! `Engine::render` maps an absolute time onto a tickable's iteration time,
//! decides whether anything needs recomputing, evaluates every eligible tween
//! and fires lifecycle callbacks. It is the only place tween values change.

use tracing::trace;

use crate::clock::TickMode;
use crate::config::MIN_VALUE;
use crate::engine::Engine;
use crate::handle::resolve;
use crate::ids::TickableId;
use crate::interp::interpolate;
use crate::outputs::{Change, CoreEvent};
use crate::params::Composition;
use crate::timer::{fire, Tickable};
use crate::tween::live_neighbor;

impl Engine {
    /// Evaluate `id` at `time` (delay included). Returns whether any tween
    /// value was recomputed.
    pub(crate) fn render(
        &mut self,
        id: TickableId,
        time: f64,
        mute_callbacks: bool,
        internal_render: bool,
        tick_mode: TickMode,
    ) -> bool {
        let precision = self.cfg.precision;
        let tick_threshold = self.cfg.tick_threshold;
        let Engine {
            tickables,
            tweens,
            io,
            outputs,
            ..
        } = self;
        let Some(tickable) = tickables.get_mut(id) else {
            return false;
        };
        let Tickable {
            state,
            tweens: tween_ids,
            callbacks,
            completions,
            ..
        } = tickable;

        let duration = state.duration;
        let completed = state.completed;
        let iteration_duration = state.iteration_duration;
        let iteration_count = state.iteration_count;
        let previous_iteration = state.current_iteration;
        let loop_delay = state.loop_delay;
        let delay = state.delay;
        let previous_absolute_time = state.clock.current_time;

        let end_time = delay + iteration_duration;
        let absolute_time = time - delay;
        let previous_time = previous_absolute_time.clamp(-delay, duration);
        let current_time = absolute_time.clamp(-delay, duration);
        let delta_time = absolute_time - previous_absolute_time;
        let above_zero = current_time > 0.0;
        let at_end = current_time >= duration;
        let is_setter = duration <= MIN_VALUE;
        let forced_tick = tick_mode == TickMode::Force;

        let mut is_odd = false;
        let mut elapsed = absolute_time;
        if iteration_count > 1.0 {
            let span = iteration_duration + if at_end { 0.0 } else { loop_delay };
            let mut iteration = (current_time / span).floor().clamp(0.0, iteration_count);
            if at_end {
                iteration -= 1.0;
            }
            state.current_iteration = iteration.max(0.0);
            is_odd = state.current_iteration % 2.0 == 1.0;
            elapsed = current_time % (iteration_duration + loop_delay);
            if elapsed.is_nan() {
                elapsed = 0.0;
            }
        }

        let is_reversed = state.reversed ^ (state.alternate && is_odd);
        let mut iteration_time = if at_end {
            if is_reversed {
                0.0
            } else {
                iteration_duration
            }
        } else if is_reversed {
            iteration_duration - elapsed
        } else {
            elapsed
        };
        iteration_time = iteration_time.clamp(0.0, iteration_duration);
        if let Some(ease) = &state.ease {
            iteration_time = iteration_duration * ease.apply(iteration_time / iteration_duration);
        }
        let backwards = if absolute_time < previous_absolute_time {
            !is_reversed
        } else {
            is_reversed
        };

        state.clock.current_time = absolute_time;
        state.iteration_time = iteration_time;
        state.backwards = backwards;

        if above_zero && !state.began {
            state.began = true;
            if !mute_callbacks {
                fire(&mut callbacks.on_begin, &state.snapshot(id, precision));
                outputs.push_event(CoreEvent::Began { tickable: id });
            }
        } else if absolute_time <= 0.0 {
            state.began = false;
        }

        // Fired before rendering so the callback sees the new iteration.
        if !mute_callbacks && above_zero && state.current_iteration != previous_iteration {
            fire(&mut callbacks.on_loop, &state.snapshot(id, precision));
            outputs.push_event(CoreEvent::Looped {
                tickable: id,
                iteration: state.current_iteration(),
            });
        }

        let due = forced_tick
            || (tick_mode == TickMode::Auto
                && ((time >= delay && time <= end_time)
                    || (time <= delay && previous_time > delay)
                    || (time >= end_time && previous_time != duration)))
            || (iteration_time >= end_time && previous_time != duration)
            || (iteration_time <= delay && previous_time > 0.0)
            || (time <= previous_time && previous_time == duration && completed)
            || (at_end && !completed && is_setter);

        let mut rendered = 0usize;
        if due {
            if above_zero {
                state.clock.compute_delta_time(current_time);
                if !mute_callbacks {
                    fire(&mut callbacks.on_before_update, &state.snapshot(id, precision));
                }
            }

            // A jump past the threshold is treated as a manual seek.
            let signed_delta = if backwards { -delta_time } else { delta_time };
            let forced_render = forced_tick || signed_delta >= tick_threshold;
            let absolute = state.offset + delay + iteration_time;

            for tween_id in tween_ids.iter().copied() {
                let Some(tween) = tweens.get(tween_id) else {
                    continue;
                };
                let tween_abs_end = tween.absolute_end_time();
                let has_composition = tween.composition != Composition::None;
                let next = if has_composition {
                    live_neighbor(tweens, tween_id, true).and_then(|n| tweens.get(n))
                } else {
                    None
                };
                let prev = if has_composition {
                    live_neighbor(tweens, tween_id, false).and_then(|p| tweens.get(p))
                } else {
                    None
                };

                let in_window = forced_render
                    || ((tween.current_time != tween.change_duration
                        || absolute <= tween_abs_end + next.map_or(0.0, |n| n.delay))
                        && (tween.current_time != 0.0
                            || absolute >= tween.absolute_start_time));
                let composed = !has_composition
                    || (!tween.is_overridden
                        && (!tween.is_overlapped || absolute <= tween_abs_end)
                        && next.map_or(true, |n| absolute <= n.absolute_start_time)
                        && prev.map_or(true, |p| absolute >= p.absolute_end_time()));
                if !(in_window && composed) {
                    continue;
                }

                let Some(tween) = tweens.get_mut(tween_id) else {
                    continue;
                };
                let new_time = (iteration_time - tween.start_time).clamp(0.0, tween.change_duration);
                tween.current_time = new_time;
                let progress = tween.ease.apply(new_time / tween.update_duration);
                let tween_precision = if progress == 0.0 || progress == 1.0 {
                    None
                } else {
                    Some(precision)
                };
                let value = interpolate(tween, progress, tween_precision);
                rendered += 1;
                if internal_render || tween.composition == Composition::Blend {
                    continue;
                }
                io.write(tween.key.target, &tween.key.property, &value);
                outputs.push_change(Change {
                    tickable: Some(id),
                    target: tween.key.target,
                    property: tween.key.property.clone(),
                    value,
                });
            }

            if !mute_callbacks && rendered > 0 {
                fire(&mut callbacks.on_render, &state.snapshot(id, precision));
            }
            if !mute_callbacks && above_zero {
                fire(&mut callbacks.on_update, &state.snapshot(id, precision));
            }
        }

        if above_zero && at_end {
            if iteration_count.is_infinite() {
                // Roll the clock so the next tick starts over.
                state.clock.start_time += duration;
            } else if state.current_iteration >= iteration_count - 1.0 {
                state.paused = true;
                if !completed {
                    state.completed = true;
                    let view = state.snapshot(id, precision);
                    for slot in completions.drain(..) {
                        resolve(&slot, view.clone());
                    }
                    if !mute_callbacks {
                        fire(&mut callbacks.on_complete, &view);
                        outputs.push_event(CoreEvent::Completed { tickable: id });
                    }
                    trace!(?id, "completed");
                }
            }
        } else {
            state.completed = false;
        }

        rendered > 0
    }
}
