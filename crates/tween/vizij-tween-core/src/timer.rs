//! Timer playback state machine.
//!
//! Plain timers and animations share one `Tickable` record: a `TimerState`
//! (clock, iteration math, direction and lifecycle flags) plus, for
//! animations, the ordered tween list. Playback operations live on `Engine`
//! because almost all of them re-render or touch the active list.
//!
//! States: idle -> playing -> paused <-> playing -> completed. `cancelled`
//! is reachable from anywhere; seek/reset/restart revive first.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, TickMode};
use crate::config::{Defaults, MAX_VALUE, MIN_VALUE};
use crate::easing::Easing;
use crate::engine::Engine;
use crate::error::TweenError;
use crate::handle::{Completion, CompletionSlot};
use crate::ids::{PropertyKey, TickableId, TweenId};
use crate::interp::functions::round_to;
use crate::outputs::CoreEvent;
use crate::params::{Callback, Callbacks, PlaybackParams, TimerParams};
use crate::value::Value;
use crate::Result;

/// Clamp a duration into `[MIN_VALUE, MAX_VALUE]`, rounding away float noise.
pub(crate) fn normalize_time(time: f64) -> f64 {
    if time.is_nan() || time <= MIN_VALUE {
        MIN_VALUE
    } else if time.is_infinite() || time >= MAX_VALUE {
        MAX_VALUE
    } else {
        round_to(time, 11)
    }
}

#[derive(Clone, Debug)]
pub struct TimerState {
    pub clock: Clock,
    /// Engine time when the timer was created.
    pub offset: f64,
    pub delay: f64,
    pub loop_delay: f64,
    /// Total across iterations.
    pub duration: f64,
    pub iteration_duration: f64,
    /// Finite count or `f64::INFINITY`.
    pub iteration_count: f64,
    pub iteration_time: f64,
    pub current_iteration: f64,
    pub reversed: bool,
    /// Direction requested at construction; `reset` returns to it.
    pub initially_reversed: bool,
    pub alternate: bool,
    pub backwards: bool,
    pub paused: bool,
    pub began: bool,
    pub completed: bool,
    pub cancelled: bool,
    pub running: bool,
    pub autoplay: bool,
    pub ease: Option<Easing>,
}

impl TimerState {
    pub fn new(
        delay: f64,
        iteration_duration: f64,
        playback: &PlaybackParams,
        defaults: &Defaults,
        offset: f64,
    ) -> Self {
        let loops = playback.loops.unwrap_or(defaults.loops);
        let iteration_count = loops.iteration_count();
        let loop_delay = playback.loop_delay.unwrap_or(defaults.loop_delay).max(0.0);
        let iteration_duration = normalize_time(iteration_duration);
        let duration =
            normalize_time((iteration_duration + loop_delay) * iteration_count - loop_delay);
        let reversed = playback.reversed.unwrap_or(defaults.reversed);

        let mut clock = Clock::new(0.0);
        clock.set_fps(playback.frame_rate.unwrap_or(defaults.frame_rate));
        clock.set_speed(playback.playback_rate.unwrap_or(defaults.playback_rate));

        Self {
            clock,
            offset,
            delay: delay.max(0.0),
            loop_delay,
            duration,
            iteration_duration,
            iteration_count,
            iteration_time: 0.0,
            current_iteration: 0.0,
            reversed,
            initially_reversed: reversed,
            alternate: playback.alternate.unwrap_or(defaults.alternate),
            backwards: false,
            paused: true,
            began: false,
            completed: false,
            cancelled: false,
            running: false,
            autoplay: playback.autoplay.unwrap_or(defaults.autoplay),
            ease: playback.playback_ease.clone(),
        }
    }

    /// Playhead in `[-delay, duration]`.
    pub fn current_time(&self, precision: i32) -> f64 {
        round_to(self.clock.current_time, precision).clamp(-self.delay, self.duration)
    }

    pub fn iteration_current_time(&self, precision: i32) -> f64 {
        round_to(self.iteration_time, precision)
    }

    pub fn progress(&self) -> f64 {
        round_to(self.clock.current_time / self.duration, 10).clamp(0.0, 1.0)
    }

    pub fn iteration_progress(&self) -> f64 {
        round_to(self.iteration_time / self.iteration_duration, 10).clamp(0.0, 1.0)
    }

    #[inline]
    pub fn current_iteration(&self) -> u64 {
        self.current_iteration.max(0.0) as u64
    }

    pub fn snapshot(&self, id: TickableId, precision: i32) -> TimerView {
        TimerView {
            id,
            current_time: self.current_time(precision),
            iteration_current_time: self.iteration_current_time(precision),
            progress: self.progress(),
            iteration_progress: self.iteration_progress(),
            current_iteration: self.current_iteration(),
            duration: self.duration,
            iteration_duration: self.iteration_duration,
            delta_time: self.clock.delta_time,
            began: self.began,
            paused: self.paused,
            completed: self.completed,
            cancelled: self.cancelled,
            reversed: self.reversed,
            backwards: self.backwards,
        }
    }
}

/// Read-only snapshot handed to callbacks and completion futures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimerView {
    pub id: TickableId,
    pub current_time: f64,
    pub iteration_current_time: f64,
    pub progress: f64,
    pub iteration_progress: f64,
    pub current_iteration: u64,
    pub duration: f64,
    pub iteration_duration: f64,
    pub delta_time: f64,
    pub began: bool,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
    pub reversed: bool,
    pub backwards: bool,
}

/// Engine record for a timer or animation.
#[derive(Debug)]
pub struct Tickable {
    pub state: TimerState,
    /// Tweens in construction order; empty for plain timers.
    pub tweens: Vec<TweenId>,
    /// Values read before this animation first wrote each property.
    pub(crate) originals: Vec<(PropertyKey, Value)>,
    pub(crate) callbacks: Callbacks,
    pub(crate) completions: Vec<CompletionSlot>,
    /// Every handle has been dropped; free once detached.
    pub(crate) released: bool,
}

impl Tickable {
    pub(crate) fn new(state: TimerState, callbacks: Callbacks) -> Self {
        Self {
            state,
            tweens: Vec::new(),
            originals: Vec::new(),
            callbacks,
            completions: Vec::new(),
            released: false,
        }
    }

    #[inline]
    pub fn is_animation(&self) -> bool {
        !self.tweens.is_empty()
    }

    #[inline]
    pub fn view(&self, id: TickableId, precision: i32) -> TimerView {
        self.state.snapshot(id, precision)
    }
}

#[inline]
pub(crate) fn fire(callback: &mut Option<Callback>, view: &TimerView) {
    if let Some(f) = callback.as_mut() {
        f(view);
    }
}

fn not_found(id: TickableId) -> TweenError {
    TweenError::TickableNotFound {
        id: format!("{id:?}"),
    }
}

impl Engine {
    pub(crate) fn tickable_mut(&mut self, id: TickableId) -> Result<&mut Tickable> {
        self.tickables.get_mut(id).ok_or_else(|| not_found(id))
    }

    pub fn tickable(&self, id: TickableId) -> Result<&Tickable> {
        self.tickables.get(id).ok_or_else(|| not_found(id))
    }

    /// Snapshot of a tickable's playback state.
    pub fn view(&self, id: TickableId) -> Result<TimerView> {
        Ok(self.tickable(id)?.view(id, self.cfg.precision))
    }

    /// Register a plain timer and run its init sequence.
    pub fn create_timer(&mut self, params: TimerParams) -> TickableId {
        let defaults = &self.cfg.defaults;
        let state = TimerState::new(
            params.delay.unwrap_or(defaults.delay),
            params.duration.unwrap_or(defaults.duration),
            &params.playback,
            defaults,
            self.now(),
        );
        let id = self.tickables.insert(Tickable::new(state, params.callbacks));
        self.init(id);
        id
    }

    /// Reset to the start, then autoplay when requested.
    pub(crate) fn init(&mut self, id: TickableId) {
        if let Err(err) = self.reset(id) {
            debug!(?err, "init on missing tickable");
            return;
        }
        let autoplay = self.tickables.get(id).is_some_and(|t| t.state.autoplay);
        if autoplay {
            if let Err(err) = self.resume(id) {
                debug!(?err, "autoplay on missing tickable");
            }
        }
    }

    /// Map engine time onto the timer's own clock so the next tick continues
    /// from the current playhead.
    pub(crate) fn reset_time(&mut self, id: TickableId) -> Result<()> {
        let now = self.now();
        let engine_speed = self.clock.speed();
        let state = &mut self.tickable_mut(id)?.state;
        let time_scale = 1.0 / (state.clock.speed() * engine_speed);
        state.clock.start_time = now - (state.clock.current_time + state.delay) * time_scale;
        Ok(())
    }

    pub fn pause(&mut self, id: TickableId) -> Result<()> {
        let precision = self.cfg.precision;
        let tickable = self.tickable_mut(id)?;
        if tickable.state.paused {
            return Ok(());
        }
        tickable.state.paused = true;
        let view = tickable.view(id, precision);
        fire(&mut tickable.callbacks.on_pause, &view);
        self.outputs.push_event(CoreEvent::Paused { tickable: id });
        Ok(())
    }

    pub fn resume(&mut self, id: TickableId) -> Result<()> {
        self.revive(id)?;
        let tickable = self.tickable_mut(id)?;
        if !tickable.state.paused {
            return Ok(());
        }
        tickable.state.paused = false;
        // Zero-length timers can be rendered right away.
        if tickable.state.duration <= MIN_VALUE {
            self.render(id, MIN_VALUE, false, false, TickMode::Force);
            return Ok(());
        }
        if !tickable.state.running {
            tickable.state.running = true;
            self.active.push(id);
        }
        self.reset_time(id)?;
        // Make sure the next frame advances by at least one tick.
        self.tickable_mut(id)?.state.clock.start_time -= 12.0;
        self.wake();
        Ok(())
    }

    /// Render synchronously at `time`, resuming afterwards if the timer was running.
    pub fn seek(&mut self, id: TickableId, time: f64, mute_callbacks: bool) -> Result<()> {
        self.revive(id)?;
        let tickable = self.tickable_mut(id)?;
        tickable.state.completed = false;
        let was_paused = tickable.state.paused;
        tickable.state.paused = true;
        let delay = tickable.state.delay;
        self.render(id, time + delay, mute_callbacks, false, TickMode::Auto);
        self.additive_pass();
        if !was_paused {
            self.resume(id)?;
        }
        Ok(())
    }

    /// Flip direction, re-seeking to the mirrored playhead.
    pub fn alternate(&mut self, id: TickableId) -> Result<()> {
        let state = &mut self.tickable_mut(id)?.state;
        let reversed = state.reversed;
        let count = state.iteration_count;
        let iteration_duration = state.iteration_duration;
        let iterations = if count.is_infinite() {
            (MAX_VALUE / iteration_duration).floor()
        } else {
            count
        };
        state.reversed = if state.alternate && iterations % 2.0 == 0.0 {
            reversed
        } else {
            !reversed
        };
        if count.is_infinite() {
            let progress = state.iteration_progress();
            let mirrored = if state.reversed {
                1.0 - progress
            } else {
                progress
            };
            self.set_iteration_progress(id, mirrored)?;
        } else {
            let current = state.clock.current_time;
            self.seek(id, iteration_duration * iterations - current, false)?;
        }
        self.reset_time(id)
    }

    pub fn play(&mut self, id: TickableId) -> Result<()> {
        if self.tickable(id)?.state.reversed {
            self.alternate(id)?;
        }
        self.resume(id)
    }

    /// Run backwards from the current playhead. Unlike `alternate`, the
    /// playhead stays put, so the rendered position mirrors: `reverse()` at
    /// 300 of 1000 shows what 700 shows going forwards.
    pub fn reverse(&mut self, id: TickableId) -> Result<()> {
        let state = &mut self.tickable_mut(id)?.state;
        if !state.reversed {
            state.reversed = true;
            let current = state.clock.current_time.clamp(0.0, state.duration);
            self.seek(id, current, false)?;
        }
        self.resume(id)
    }

    pub fn restart(&mut self, id: TickableId) -> Result<()> {
        self.reset(id)?;
        self.resume(id)
    }

    /// Revive, render the start state, and clear the lifecycle flags.
    pub fn reset(&mut self, id: TickableId) -> Result<()> {
        self.revive(id)?;
        let state = &mut self.tickable_mut(id)?.state;
        if state.reversed && !state.initially_reversed {
            state.reversed = false;
        }
        state.iteration_time = state.iteration_duration;
        self.render(id, 0.0, true, false, TickMode::Force);
        let state = &mut self.tickable_mut(id)?.state;
        state.paused = true;
        state.began = false;
        state.completed = false;
        Ok(())
    }

    pub fn complete(&mut self, id: TickableId) -> Result<()> {
        let duration = self.tickable(id)?.state.duration;
        self.seek(id, duration, false)?;
        self.cancel(id)
    }

    /// Flag the timer and its tweens cancelled, then pause. Sibling links stay
    /// in place until the timer is revived or freed.
    pub fn cancel(&mut self, id: TickableId) -> Result<()> {
        let tickable = self.tickables.get_mut(id).ok_or_else(|| not_found(id))?;
        if !tickable.state.cancelled {
            tickable.state.cancelled = true;
            for tween_id in &tickable.tweens {
                if let Some(tween) = self.tweens.get_mut(*tween_id) {
                    tween.cancelled = true;
                }
            }
            self.outputs.push_event(CoreEvent::Cancelled { tickable: id });
        }
        self.pause(id)
    }

    /// Undo a cancellation by recomposing every tween into its chain.
    pub(crate) fn revive(&mut self, id: TickableId) -> Result<()> {
        let tickable = self.tickables.get_mut(id).ok_or_else(|| not_found(id))?;
        if !tickable.state.cancelled {
            return Ok(());
        }
        tickable.state.cancelled = false;
        let tween_ids = tickable.tweens.clone();
        let mut touched = Vec::new();
        for tween_id in tween_ids {
            self.compositor.detach(&mut self.tweens, tween_id);
            if let Some(tween) = self.tweens.get_mut(tween_id) {
                tween.cancelled = false;
            }
            touched.extend(
                self.compositor
                    .relink(&mut self.tweens, &self.tickables, tween_id),
            );
        }
        self.cancel_overridden_parents(touched);
        Ok(())
    }

    /// Render the start state, restore the values captured before the first
    /// write, and free the timer with its tweens.
    pub fn revert(&mut self, id: TickableId) -> Result<()> {
        self.tickable(id)?;
        self.render(id, 0.0, true, false, TickMode::Auto);
        self.cancel(id)?;
        let originals = std::mem::take(&mut self.tickable_mut(id)?.originals);
        for (key, value) in originals {
            self.io.write(key.target, &key.property, &value);
            self.outputs.push_change(crate::outputs::Change {
                tickable: Some(id),
                target: key.target,
                property: key.property,
                value,
            });
        }
        self.outputs.push_event(CoreEvent::Reverted { tickable: id });
        self.free(id);
        Ok(())
    }

    /// Rescale every duration (and tween window) to fit `new_duration`.
    pub fn stretch(&mut self, id: TickableId, new_duration: f64) -> Result<()> {
        let tickable = self.tickables.get_mut(id).ok_or_else(|| not_found(id))?;
        let state = &mut tickable.state;
        let current = state.duration;
        if current == normalize_time(new_duration) {
            return Ok(());
        }
        let scale = new_duration.max(0.0) / current;
        state.duration = normalize_time(current * scale);
        state.iteration_duration = normalize_time(state.iteration_duration * scale);
        state.loop_delay = (state.loop_delay * scale).max(0.0);
        state.delay = (state.delay * scale).max(0.0);
        let base = state.offset + state.delay;
        for tween_id in &tickable.tweens {
            if let Some(tween) = self.tweens.get_mut(*tween_id) {
                tween.update_duration = normalize_time(tween.update_duration * scale);
                tween.change_duration = normalize_time(tween.change_duration * scale);
                tween.current_time *= scale;
                tween.start_time *= scale;
                tween.delay *= scale;
                tween.absolute_start_time = base + tween.start_time;
            }
        }
        Ok(())
    }

    pub fn set_timer_speed(&mut self, id: TickableId, speed: f64) -> Result<()> {
        self.tickable_mut(id)?.state.clock.set_speed(speed);
        self.reset_time(id)
    }

    pub fn set_timer_fps(&mut self, id: TickableId, fps: f64) -> Result<()> {
        self.tickable_mut(id)?.state.clock.set_fps(fps);
        Ok(())
    }

    /// Move the playhead, keeping the running/paused state.
    pub fn set_current_time(&mut self, id: TickableId, time: f64) -> Result<()> {
        let was_paused = self.tickable(id)?.state.paused;
        self.pause(id)?;
        self.seek(id, time, false)?;
        if !was_paused {
            self.resume(id)?;
        }
        Ok(())
    }

    pub fn set_progress(&mut self, id: TickableId, progress: f64) -> Result<()> {
        let duration = self.tickable(id)?.state.duration;
        self.set_current_time(id, duration * progress)
    }

    pub fn set_iteration_progress(&mut self, id: TickableId, progress: f64) -> Result<()> {
        let state = &self.tickable(id)?.state;
        let iteration_duration = state.iteration_duration;
        let base = (iteration_duration + state.loop_delay) * state.current_iteration;
        self.set_current_time(id, base + iteration_duration * progress)
    }

    pub fn set_current_iteration(&mut self, id: TickableId, iteration: u64) -> Result<()> {
        let state = &self.tickable(id)?.state;
        let last = (state.iteration_count - 1.0).max(0.0);
        let span = state.iteration_duration + state.loop_delay;
        let time = span * (iteration as f64).clamp(0.0, last);
        self.set_current_time(id, time)
    }

    /// Future resolved on the next natural completion, or right away if the
    /// timer already completed.
    pub fn then(&mut self, id: TickableId) -> Result<Completion> {
        let precision = self.cfg.precision;
        let tickable = self.tickable_mut(id)?;
        if tickable.state.completed {
            return Ok(Completion::ready(tickable.view(id, precision)));
        }
        let (completion, slot) = Completion::pending();
        tickable.completions.push(slot);
        Ok(completion)
    }
}
