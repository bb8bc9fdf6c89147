//! Frame clock shared by the engine and every tickable, plus wall-clock sources.
//!
//! All times are milliseconds stored as `f64`.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::{K, MAX_FPS, MIN_VALUE};

/// How a render call decides whether tween values must be recomputed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickMode {
    /// Frame skipped by rate limiting; timing state still advances.
    None,
    /// Render only when the playhead crosses something worth rendering.
    Auto,
    /// Always render.
    Force,
}

/// Frame-rate aware clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clock {
    pub delta_time: f64,
    pub(crate) current_time: f64,
    pub(crate) elapsed_time: f64,
    pub(crate) start_time: f64,
    pub(crate) last_time: f64,
    pub(crate) scheduled_time: f64,
    frame_duration: f64,
    fps: f64,
    speed: f64,
}

impl Clock {
    pub fn new(init_time: f64) -> Self {
        Self {
            delta_time: 0.0,
            current_time: init_time,
            elapsed_time: init_time,
            start_time: init_time,
            last_time: init_time,
            scheduled_time: 0.0,
            frame_duration: (K / MAX_FPS).round(),
            fps: MAX_FPS,
            speed: 1.0,
        }
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    /// Change the frame rate; in-flight scheduling shifts by the frame duration delta.
    pub fn set_fps(&mut self, frame_rate: f64) {
        let previous = self.frame_duration;
        let fps = if frame_rate.is_nan() || frame_rate < MIN_VALUE {
            MIN_VALUE
        } else {
            frame_rate
        };
        let frame_duration = (K / fps).round().max(MIN_VALUE);
        self.fps = fps;
        self.frame_duration = frame_duration;
        self.scheduled_time += frame_duration - previous;
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the playback rate. Never zero or negative.
    pub fn set_speed(&mut self, playback_rate: f64) {
        self.speed = if playback_rate.is_nan() || playback_rate < MIN_VALUE {
            MIN_VALUE
        } else {
            playback_rate
        };
    }

    /// Gate a tick on the frame duration. Returns `TickMode::None` when less than
    /// one frame has elapsed since the last scheduled tick.
    pub fn request_tick(&mut self, time: f64) -> TickMode {
        let scheduled_time = self.scheduled_time;
        let elapsed_time = self.elapsed_time;
        self.elapsed_time = time;
        if elapsed_time < scheduled_time {
            return TickMode::None;
        }
        let frame_duration = self.frame_duration;
        let frame_delta = elapsed_time - scheduled_time;
        // Advance by at least one frame; skip ahead when running late.
        self.scheduled_time += if frame_delta < frame_duration {
            frame_duration
        } else {
            frame_delta
        };
        TickMode::Auto
    }

    /// Record `time` as the latest tick and return the delta since the previous one.
    pub fn compute_delta_time(&mut self, time: f64) -> f64 {
        let delta = time - self.last_time;
        self.delta_time = delta;
        self.last_time = time;
        delta
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Monotonic millisecond time source.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// `Instant`-backed source measuring from its own creation.
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * K
    }
}

/// Manually advanced time source. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<f64>>,
}

impl ManualTimeSource {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_follows_fps() {
        let mut clock = Clock::new(0.0);
        assert_eq!(clock.frame_duration(), 8.0);
        clock.set_fps(60.0);
        assert_eq!(clock.frame_duration(), 17.0);
        clock.set_fps(0.0);
        assert!(clock.fps() > 0.0);
        assert!(clock.frame_duration() > 0.0);
    }

    #[test]
    fn speed_is_clamped_positive() {
        let mut clock = Clock::default();
        clock.set_speed(-3.0);
        assert!(clock.speed() > 0.0);
        clock.set_speed(2.0);
        assert_eq!(clock.speed(), 2.0);
    }

    #[test]
    fn request_tick_skips_sub_frame_intervals() {
        let mut clock = Clock::new(0.0);
        // 100ms frames; the switch from 8ms pushes the schedule to 92ms.
        clock.set_fps(10.0);
        assert_eq!(clock.request_tick(0.0), TickMode::None);
        assert_eq!(clock.request_tick(100.0), TickMode::None);
        assert_eq!(clock.request_tick(150.0), TickMode::Auto);
        assert_eq!(clock.request_tick(200.0), TickMode::None);
        assert_eq!(clock.request_tick(250.0), TickMode::Auto);
    }

    #[test]
    fn delta_time_tracks_last_tick() {
        let mut clock = Clock::new(0.0);
        assert_eq!(clock.compute_delta_time(16.0), 16.0);
        assert_eq!(clock.compute_delta_time(40.0), 24.0);
        assert_eq!(clock.delta_time, 24.0);
    }

    #[test]
    fn manual_source_is_shared() {
        let a = ManualTimeSource::new(5.0);
        let b = a.clone();
        a.advance(10.0);
        assert_eq!(b.now_ms(), 15.0);
    }
}
