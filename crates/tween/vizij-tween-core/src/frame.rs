//! Frame sources and the timed fallback loop.
//!
//! The engine only asks for frames; the host decides when to deliver them by
//! calling `Engine::tick_frame`. Hosts without a display callback can use
//! [`run_until_idle`], which sleeps one engine frame between ticks.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::handle::EngineHandle;

/// Platform primitive that schedules the next frame callback.
pub trait FrameSource {
    fn request_frame(&mut self);
    fn cancel_frame(&mut self);
}

/// Frame source that only records requests. Clones share counters.
#[derive(Clone, Debug, Default)]
pub struct ManualFrames {
    requested: Rc<Cell<u64>>,
    pending: Rc<Cell<bool>>,
}

impl ManualFrames {
    /// Total frames requested so far.
    pub fn requested(&self) -> u64 {
        self.requested.get()
    }

    /// Whether a request is outstanding; clears it.
    pub fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }
}

impl FrameSource for ManualFrames {
    fn request_frame(&mut self) {
        self.requested.set(self.requested.get() + 1);
        self.pending.set(true);
    }

    fn cancel_frame(&mut self) {
        self.pending.set(false);
    }
}

/// Drive the engine with `thread::sleep` until nothing is active or
/// `max_frames` have run. Returns the number of frames ticked.
pub fn run_until_idle(handle: &EngineHandle, max_frames: usize) -> usize {
    run_until_idle_with(handle, max_frames, |ms| {
        std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
    })
}

/// As [`run_until_idle`], with a custom wait between frames (in ms).
pub fn run_until_idle_with(
    handle: &EngineHandle,
    max_frames: usize,
    mut wait: impl FnMut(f64),
) -> usize {
    let mut frames = 0;
    while frames < max_frames {
        let (idle, frame_duration) = handle.with(|e| (e.active().is_empty(), e.clock.frame_duration()));
        if idle {
            break;
        }
        wait(frame_duration);
        handle.with_mut(|e| {
            e.tick_frame();
        });
        frames += 1;
    }
    if frames == max_frames {
        debug!(max_frames, "fallback loop stopped at frame limit");
    }
    frames
}
