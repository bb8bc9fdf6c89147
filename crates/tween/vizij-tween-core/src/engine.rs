//! Engine: data ownership and the per-frame scheduling loop.
//!
//! Methods:
//! - new/with_parts, create_timer, create_animation (see `animation`)
//! - update/update_at: sweep the active list, then the additive pass
//! - tick_frame/wake: frame-source plumbing; the engine sleeps when idle
//! - begin_frame/end_frame: manually measured frames

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::binding::{PropertyStore, ValueIo};
use crate::clock::{Clock, SystemTimeSource, TickMode, TimeSource};
use crate::composition::{AdditiveLookup, Compositor};
use crate::config::Config;
use crate::error::TweenError;
use crate::frame::{FrameSource, ManualFrames};
use crate::ids::{PropertyKey, TickableId, TweenId};
use crate::outputs::Outputs;
use crate::timer::Tickable;
use crate::tween::Tween;
use crate::Result;

/// Ids whose last handle was dropped. Shared with handles so `Drop` never
/// needs to borrow the engine.
pub(crate) type ReleaseQueue = Rc<RefCell<Vec<TickableId>>>;

pub struct Engine {
    pub(crate) cfg: Config,
    pub(crate) clock: Clock,
    pub(crate) tickables: SlotMap<TickableId, Tickable>,
    pub(crate) tweens: SlotMap<TweenId, Tween>,
    /// Running tickables in insertion order.
    pub(crate) active: Vec<TickableId>,
    pub(crate) compositor: Compositor,
    pub(crate) io: Box<dyn ValueIo>,
    time: Box<dyn TimeSource>,
    frames: Box<dyn FrameSource>,
    pub(crate) outputs: Outputs,
    paused: bool,
    frame_requested: bool,
    open_frame: Option<f64>,
    pub(crate) releases: ReleaseQueue,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("cfg", &self.cfg)
            .field("clock", &self.clock)
            .field("tickables", &self.tickables.len())
            .field("tweens", &self.tweens.len())
            .field("active", &self.active)
            .field("paused", &self.paused)
            .field("frame_requested", &self.frame_requested)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over an in-memory property store, wall-clock time and a manual
    /// frame source.
    pub fn new(cfg: Config) -> Self {
        Self::with_parts(
            cfg,
            Box::new(PropertyStore::new()),
            Box::new(SystemTimeSource::new()),
            Box::new(ManualFrames::default()),
        )
    }

    pub fn with_parts(
        cfg: Config,
        io: Box<dyn ValueIo>,
        time: Box<dyn TimeSource>,
        frames: Box<dyn FrameSource>,
    ) -> Self {
        let mut clock = Clock::new(time.now_ms());
        clock.set_fps(cfg.fps);
        clock.set_speed(cfg.speed);
        Self {
            cfg,
            clock,
            tickables: SlotMap::with_key(),
            tweens: SlotMap::with_key(),
            active: Vec::new(),
            compositor: Compositor::default(),
            io,
            time,
            frames,
            outputs: Outputs::default(),
            paused: false,
            frame_requested: false,
            open_frame: None,
            releases: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Current engine time in milliseconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.time.now_ms()
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Drain everything recorded since the last update or drain. Hosts that
    /// drive playback with `seek` instead of `update` call this per step.
    pub fn take_outputs(&mut self) -> Outputs {
        std::mem::take(&mut self.outputs)
    }

    pub fn active(&self) -> &[TickableId] {
        &self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a frame has been requested and not yet delivered.
    pub fn frame_requested(&self) -> bool {
        self.frame_requested
    }

    pub fn tween(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.get(id)
    }

    /// Blend lookup for a property while any blend tween on it is allocated.
    pub fn additive_lookup(&self, key: &PropertyKey) -> Option<&AdditiveLookup> {
        self.compositor.lookup(key)
    }

    /// Replace-composition chain for a property, head to tail.
    pub fn sibling_order(&self, key: &PropertyKey) -> Vec<TweenId> {
        self.compositor.siblings(&self.tweens, key)
    }

    /// Advance every active tickable to the time source's `now`.
    pub fn update(&mut self) -> &Outputs {
        let now = self.now();
        self.update_at(now)
    }

    /// Advance every active tickable to engine time `time`.
    pub fn update_at(&mut self, time: f64) -> &Outputs {
        self.outputs.clear();
        if self.paused || self.clock.request_tick(time) == TickMode::None {
            return &self.outputs;
        }
        self.clock.compute_delta_time(time);
        let engine_speed = self.clock.speed();
        let engine_fps = self.clock.fps();

        let sweep = std::mem::take(&mut self.active);
        let mut still_active = Vec::with_capacity(sweep.len());
        for id in sweep {
            let Some(tickable) = self.tickables.get_mut(id) else {
                continue;
            };
            let state = &mut tickable.state;
            if !state.paused {
                let mode = if state.clock.fps() < engine_fps {
                    state.clock.request_tick(time)
                } else {
                    TickMode::Auto
                };
                let local = (time - state.clock.start_time) * state.clock.speed() * engine_speed;
                still_active.push(id);
                self.render(id, local, false, false, mode);
            } else {
                state.running = false;
                let finished = state.completed && !state.cancelled;
                let released = tickable.released;
                if finished {
                    if let Err(err) = self.cancel(id) {
                        debug!(?err, "cancel of finished tickable failed");
                    }
                }
                if released {
                    self.free(id);
                }
            }
        }
        // Anything resumed during the sweep was appended to the fresh list.
        still_active.append(&mut self.active);
        self.active = still_active;

        self.additive_pass();
        self.drain_releases();
        &self.outputs
    }

    /// Frame callback: keeps requesting frames while anything is active,
    /// then goes to sleep.
    pub fn tick_frame(&mut self) -> &Outputs {
        if self.active.is_empty() {
            self.frame_requested = false;
            self.outputs.clear();
            return &self.outputs;
        }
        self.frames.request_frame();
        self.update()
    }

    /// Ask the frame source for a frame unless one is already pending.
    pub fn wake(&mut self) {
        if self.paused || self.frame_requested || !self.cfg.use_default_main_loop {
            return;
        }
        self.frame_requested = true;
        self.frames.request_frame();
    }

    /// Stop ticking every tickable.
    pub fn pause_all(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if self.frame_requested {
            self.frames.cancel_frame();
            self.frame_requested = false;
        }
    }

    /// Resume ticking, re-anchoring every tickable so paused wall time is skipped.
    pub fn resume_all(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.reset_all_times();
        self.wake();
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.clock.set_speed(speed);
        self.reset_all_times();
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.clock.set_fps(fps);
    }

    /// Re-anchor every tickable's clock on the current engine time.
    fn reset_all_times(&mut self) {
        let ids: Vec<TickableId> = self.tickables.keys().collect();
        for id in ids {
            if let Err(err) = self.reset_time(id) {
                debug!(?err, "reset_time on missing tickable");
            }
        }
    }

    /// Open a manually measured frame at `time`.
    pub fn begin_frame(&mut self, time: f64) -> Result<()> {
        if let Some(opened_at) = self.open_frame {
            return Err(TweenError::FrameAlreadyOpen { opened_at });
        }
        self.open_frame = Some(time);
        Ok(())
    }

    /// Close the open frame and update at the time it was opened with.
    pub fn end_frame(&mut self) -> Result<&Outputs> {
        let time = self.open_frame.take().ok_or(TweenError::FrameNotOpen)?;
        Ok(self.update_at(time))
    }

    /// Free tickables whose handles were all dropped, unless still running.
    pub(crate) fn drain_releases(&mut self) {
        let released: Vec<TickableId> = self.releases.borrow_mut().drain(..).collect();
        for id in released {
            let Some(tickable) = self.tickables.get_mut(id) else {
                continue;
            };
            tickable.released = true;
            if !tickable.state.running {
                self.free(id);
            }
        }
    }

    /// Drop a tickable and its tweens from every arena and chain.
    pub(crate) fn free(&mut self, id: TickableId) {
        let Some(tickable) = self.tickables.remove(id) else {
            return;
        };
        for tween_id in tickable.tweens {
            self.compositor.detach(&mut self.tweens, tween_id);
            self.tweens.remove(tween_id);
        }
        self.active.retain(|a| *a != id);
        trace!(?id, "tickable freed");
    }

    pub(crate) fn release_queue(&self) -> ReleaseQueue {
        Rc::clone(&self.releases)
    }

    pub fn tickable_count(&self) -> usize {
        self.tickables.len()
    }

    pub(crate) fn log_missing(&self, op: &'static str, err: &TweenError) {
        debug!(op, %err, "playback call ignored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeSource;
    use crate::params::TimerParams;

    fn engine(time: &ManualTimeSource, frames: &ManualFrames) -> Engine {
        Engine::with_parts(
            Config::default(),
            Box::new(PropertyStore::new()),
            Box::new(time.clone()),
            Box::new(frames.clone()),
        )
    }

    #[test]
    fn frames_are_requested_once_and_stop_when_idle() {
        let time = ManualTimeSource::new(0.0);
        let frames = ManualFrames::default();
        let mut e = engine(&time, &frames);
        e.create_timer(TimerParams::new().duration(100.0));
        assert!(e.frame_requested());
        assert_eq!(frames.requested(), 1);

        for _ in 0..20 {
            time.advance(16.0);
            e.tick_frame();
        }
        assert!(e.active().is_empty());
        e.tick_frame();
        assert!(!e.frame_requested());
    }

    #[test]
    fn manual_frames_reject_nesting() {
        let mut e = Engine::new(Config::default());
        assert_eq!(e.end_frame().err(), Some(TweenError::FrameNotOpen));
        e.begin_frame(10.0).unwrap();
        assert_eq!(
            e.begin_frame(20.0),
            Err(TweenError::FrameAlreadyOpen { opened_at: 10.0 })
        );
        assert!(e.end_frame().is_ok());
        assert!(e.begin_frame(30.0).is_ok());
    }

    #[test]
    fn completed_timers_leave_the_active_list_cancelled() {
        let time = ManualTimeSource::new(0.0);
        let frames = ManualFrames::default();
        let mut e = engine(&time, &frames);
        let id = e.create_timer(TimerParams::new().duration(50.0));
        for t in [16.0, 32.0, 48.0, 64.0, 80.0, 96.0] {
            e.update_at(t);
        }
        let state = &e.tickable(id).unwrap().state;
        assert!(state.completed);
        assert!(state.cancelled);
        assert!(!state.running);
        assert!(e.active().is_empty());
    }
}
