//! Vizij Tween Core (host-agnostic)
//!
//! Frame-driven timing and value composition: timers with looping,
//! direction and seeking; animations expanded into per-property tweens;
//! replace/blend composition between concurrent animations on the same
//! property; and an engine loop that renders every active tickable once per
//! frame. Hosts read and write property values through [`ValueIo`].

pub mod animation;
pub mod binding;
pub mod clock;
pub mod composition;
pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod frame;
pub mod handle;
pub mod ids;
pub mod interp;
mod keyframes;
pub mod outputs;
pub mod params;
mod render;
pub mod spring;
pub mod stagger;
pub mod timer;
pub mod tween;
pub mod value;

// Re-exports for consumers (adapters)
pub use binding::{PropertyStore, ValueIo};
pub use clock::{Clock, ManualTimeSource, SystemTimeSource, TickMode, TimeSource};
pub use composition::{AdditiveLookup, Compositor};
pub use config::{Config, Defaults, MAX_VALUE, MIN_VALUE};
pub use easing::{Curve, Direction, EaseFn, Easing};
pub use engine::Engine;
pub use error::TweenError;
pub use frame::{run_until_idle, run_until_idle_with, FrameSource, ManualFrames};
pub use handle::{Animatable, AnimatableTarget, Completion, EngineHandle, Timer};
pub use ids::{PropertyKey, TargetAllocator, TargetId, TickableId, TweenId};
pub use outputs::{Change, CoreEvent, Outputs};
pub use params::{
    AnimationKeyframes, AnimationParams, Callbacks, Composition, KeyframeMap, Loops, Modifier,
    Param, ParamFn, PlaybackParams, PropertyValue, TimerParams, TweenParams,
};
pub use spring::{create_spring, Spring, SpringParams};
pub use stagger::{sequence, SequenceParams, SequenceValue, StaggerFrom};
pub use timer::{TimerState, TimerView};
pub use value::{decompose, parse_color, Decomposed, RawValue, RelativeOp, Value, ValueType};

/// Crate result alias.
pub type Result<T> = core::result::Result<T, TweenError>;
