//! Engine configuration and animation defaults.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::params::{Composition, Loops};

/// Milliseconds per second; every time value in the crate is in milliseconds.
pub const K: f64 = 1000.0;
/// Smallest positive duration; zero-length windows are stored as this.
pub const MIN_VALUE: f64 = 1e-11;
/// Upper bound used when an infinite iteration count needs a finite span.
pub const MAX_VALUE: f64 = 1e12;
/// Highest frame rate a clock can be set to by default.
pub const MAX_FPS: f64 = 120.0;

/// Engine-wide configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine frame rate cap.
    pub fps: f64,
    /// Global playback speed applied on top of every tickable's own speed.
    pub speed: f64,
    /// Decimal places kept for in-between values of unit/complex/color output.
    pub precision: i32,
    /// A jump larger than this (ms) forces every tween to re-render.
    pub tick_threshold: f64,
    /// When false the engine never asks its frame source for frames; the host
    /// drives `Engine::update` itself.
    pub use_default_main_loop: bool,
    /// Defaults applied to every timer and animation parameter left unset.
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fps: MAX_FPS,
            speed: 1.0,
            precision: 4,
            tick_threshold: 200.0,
            use_default_main_loop: true,
            defaults: Defaults::default(),
        }
    }
}

/// Fallback parameters for timers and animations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub delay: f64,
    pub duration: f64,
    pub loop_delay: f64,
    pub loops: Loops,
    pub alternate: bool,
    pub reversed: bool,
    pub autoplay: bool,
    pub frame_rate: f64,
    pub playback_rate: f64,
    pub ease: Easing,
    pub composition: Composition,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            delay: 0.0,
            duration: K,
            loop_delay: 0.0,
            loops: Loops::Count(1),
            alternate: false,
            reversed: false,
            autoplay: true,
            frame_rate: MAX_FPS,
            playback_rate: 1.0,
            ease: Easing::Out(2.0),
            composition: Composition::Replace,
        }
    }
}
