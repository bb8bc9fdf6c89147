//! Declarative parameters for timers and animations.
//!
//! Everything here deserializes from JSON with `serde_json` except the
//! function-valued fields (per-target params, modifiers, callbacks), which
//! are set from Rust through the builder methods.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::easing::Easing;
use crate::error::TweenError;
use crate::ids::TargetId;
use crate::timer::TimerView;
use crate::value::RawValue;

/// Number of iterations a timer plays.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LoopsRepr", into = "LoopsRepr")]
pub enum Loops {
    /// Total iterations; `Count(1)` plays once.
    Count(u32),
    Infinite,
}

impl Loops {
    /// Iteration count as used by the time math.
    pub fn iteration_count(self) -> f64 {
        match self {
            Loops::Count(n) => f64::from(n.max(1)),
            Loops::Infinite => f64::INFINITY,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LoopsRepr {
    Count(u32),
    Flag(bool),
    Text(String),
}

impl TryFrom<LoopsRepr> for Loops {
    type Error = String;

    fn try_from(repr: LoopsRepr) -> Result<Self, Self::Error> {
        match repr {
            LoopsRepr::Count(n) => Ok(Loops::Count(n)),
            LoopsRepr::Flag(true) => Ok(Loops::Infinite),
            LoopsRepr::Flag(false) => Ok(Loops::Count(1)),
            LoopsRepr::Text(s) if s.eq_ignore_ascii_case("infinite") => Ok(Loops::Infinite),
            LoopsRepr::Text(s) => Err(format!("invalid loop count '{s}'")),
        }
    }
}

impl From<Loops> for LoopsRepr {
    fn from(loops: Loops) -> Self {
        match loops {
            Loops::Count(n) => LoopsRepr::Count(n),
            Loops::Infinite => LoopsRepr::Text("infinite".into()),
        }
    }
}

/// How a tween layers with other tweens on the same target property.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composition {
    /// Independent; no sibling bookkeeping.
    None,
    /// Later tweens override or truncate earlier ones.
    Replace,
    /// Contributions sum on top of a shared base.
    Blend,
}

/// Function evaluated per target: `(target, index, total)`.
pub struct ParamFn<T>(Rc<dyn Fn(TargetId, usize, usize) -> T>);

impl<T> ParamFn<T> {
    pub fn new(f: impl Fn(TargetId, usize, usize) -> T + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, target: TargetId, index: usize, total: usize) -> T {
        (self.0)(target, index, total)
    }
}

impl<T: 'static> ParamFn<T> {
    pub fn map<U>(self, f: impl Fn(T) -> U + 'static) -> ParamFn<U> {
        let inner = self.0;
        ParamFn(Rc::new(move |t, i, n| f(inner(t, i, n))))
    }
}

impl<T> Clone for ParamFn<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for ParamFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamFn(..)")
    }
}

/// A fixed value or a per-target function.
#[derive(Clone, Debug)]
pub enum Param<T> {
    Value(T),
    Fn(ParamFn<T>),
}

impl<T: Clone> Param<T> {
    pub fn resolve(&self, target: TargetId, index: usize, total: usize) -> T {
        match self {
            Param::Value(v) => v.clone(),
            Param::Fn(f) => f.call(target, index, total),
        }
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Value(value)
    }
}

impl<T> From<ParamFn<T>> for Param<T> {
    fn from(f: ParamFn<T>) -> Self {
        Param::Fn(f)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Param<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Param::Value)
    }
}

fn fixed(param: &Option<Param<f64>>) -> Option<f64> {
    match param {
        Some(Param::Value(v)) => Some(*v),
        _ => None,
    }
}

/// Post-interpolation transform applied to every numeric component.
#[derive(Clone)]
pub struct Modifier(Rc<dyn Fn(f64) -> f64>);

impl Modifier {
    pub fn new(f: impl Fn(f64) -> f64 + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn apply(&self, n: f64) -> f64 {
        (self.0)(n)
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Modifier(..)")
    }
}

pub type Callback = Box<dyn FnMut(&TimerView)>;

/// Lifecycle callbacks. Each receives a snapshot of the timer.
#[derive(Default)]
pub struct Callbacks {
    pub on_begin: Option<Callback>,
    pub on_before_update: Option<Callback>,
    pub on_update: Option<Callback>,
    pub on_render: Option<Callback>,
    pub on_loop: Option<Callback>,
    pub on_pause: Option<Callback>,
    pub on_complete: Option<Callback>,
}

impl Callbacks {
    pub fn on_begin(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_begin = Some(Box::new(f));
        self
    }

    pub fn on_before_update(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_before_update = Some(Box::new(f));
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_render(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_render = Some(Box::new(f));
        self
    }

    pub fn on_loop(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_loop = Some(Box::new(f));
        self
    }

    pub fn on_pause(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_pause = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut(&TimerView) + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("on_begin", self.on_begin.is_some()),
            ("on_before_update", self.on_before_update.is_some()),
            ("on_update", self.on_update.is_some()),
            ("on_render", self.on_render.is_some()),
            ("on_loop", self.on_loop.is_some()),
            ("on_pause", self.on_pause.is_some()),
            ("on_complete", self.on_complete.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        f.debug_struct("Callbacks").field("set", &set).finish()
    }
}

/// Playback parameters shared by timers and animations. Unset fields fall
/// back to `Config::defaults`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackParams {
    pub loops: Option<Loops>,
    pub loop_delay: Option<f64>,
    pub alternate: Option<bool>,
    pub reversed: Option<bool>,
    pub autoplay: Option<bool>,
    pub frame_rate: Option<f64>,
    pub playback_rate: Option<f64>,
    /// Ease applied to the whole iteration on top of each tween's own ease.
    pub playback_ease: Option<Easing>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TimerParams {
    pub delay: Option<f64>,
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub playback: PlaybackParams,
    #[serde(skip)]
    pub callbacks: Callbacks,
}

impl TimerParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = Some(ms);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay = Some(ms);
        self
    }

    pub fn loops(mut self, loops: Loops) -> Self {
        self.playback.loops = Some(loops);
        self
    }

    pub fn loop_delay(mut self, ms: f64) -> Self {
        self.playback.loop_delay = Some(ms);
        self
    }

    pub fn alternate(mut self, alternate: bool) -> Self {
        self.playback.alternate = Some(alternate);
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.playback.reversed = Some(reversed);
        self
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.playback.autoplay = Some(autoplay);
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// One keyframe (or the only segment) of a property.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TweenParams {
    pub to: Option<Param<RawValue>>,
    pub from: Option<Param<RawValue>>,
    pub duration: Option<Param<f64>>,
    pub delay: Option<Param<f64>>,
    pub ease: Option<Easing>,
    pub composition: Option<Composition>,
    #[serde(skip)]
    pub modifier: Option<Modifier>,
}

impl TweenParams {
    pub fn to(value: impl Into<RawValue>) -> Self {
        Self {
            to: Some(Param::Value(value.into())),
            ..Self::default()
        }
    }

    pub fn to_fn(f: ParamFn<RawValue>) -> Self {
        Self {
            to: Some(Param::Fn(f)),
            ..Self::default()
        }
    }

    pub fn from(mut self, value: impl Into<RawValue>) -> Self {
        self.from = Some(Param::Value(value.into()));
        self
    }

    pub fn duration(mut self, ms: impl Into<Param<f64>>) -> Self {
        self.duration = Some(ms.into());
        self
    }

    pub fn delay(mut self, ms: impl Into<Param<f64>>) -> Self {
        self.delay = Some(ms.into());
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    pub fn modifier(mut self, f: impl Fn(f64) -> f64 + 'static) -> Self {
        self.modifier = Some(Modifier::new(f));
        self
    }
}

/// How one property is declared.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "PropertyRepr")]
pub enum PropertyValue {
    /// Animate from the current value to this one.
    To(Param<RawValue>),
    FromTo(Param<RawValue>, Param<RawValue>),
    Tween(TweenParams),
    /// Ordered keyframes; each `to` chains from the previous one.
    Keyframes(Vec<TweenParams>),
}

impl PropertyValue {
    /// Normalize every declaration form into an ordered keyframe list.
    pub(crate) fn into_keyframes(self) -> Vec<TweenParams> {
        match self {
            PropertyValue::To(to) => vec![TweenParams {
                to: Some(to),
                ..TweenParams::default()
            }],
            PropertyValue::FromTo(from, to) => vec![TweenParams {
                to: Some(to),
                from: Some(from),
                ..TweenParams::default()
            }],
            PropertyValue::Tween(tween) => vec![tween],
            PropertyValue::Keyframes(frames) => frames,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::To(Param::Value(RawValue::Number(n)))
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::To(Param::Value(RawValue::from(s)))
    }
}

impl From<RawValue> for PropertyValue {
    fn from(raw: RawValue) -> Self {
        PropertyValue::To(Param::Value(raw))
    }
}

impl<A: Into<RawValue>, B: Into<RawValue>> From<(A, B)> for PropertyValue {
    fn from((from, to): (A, B)) -> Self {
        PropertyValue::FromTo(Param::Value(from.into()), Param::Value(to.into()))
    }
}

impl From<TweenParams> for PropertyValue {
    fn from(tween: TweenParams) -> Self {
        PropertyValue::Tween(tween)
    }
}

impl From<Vec<TweenParams>> for PropertyValue {
    fn from(frames: Vec<TweenParams>) -> Self {
        PropertyValue::Keyframes(frames)
    }
}

impl From<ParamFn<RawValue>> for PropertyValue {
    fn from(f: ParamFn<RawValue>) -> Self {
        PropertyValue::To(Param::Fn(f))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyRepr {
    Single(RawValue),
    List(Vec<RawValue>),
    Object(TweenParams),
    Frames(Vec<TweenParams>),
}

impl From<PropertyRepr> for PropertyValue {
    fn from(repr: PropertyRepr) -> Self {
        match repr {
            PropertyRepr::Single(raw) => PropertyValue::To(Param::Value(raw)),
            PropertyRepr::List(mut values) if values.len() == 2 => {
                let to = values.pop().map(Param::Value);
                let from = values.pop().map(Param::Value);
                match (from, to) {
                    (Some(from), Some(to)) => PropertyValue::FromTo(from, to),
                    _ => PropertyValue::Keyframes(Vec::new()),
                }
            }
            PropertyRepr::List(values) => PropertyValue::Keyframes(
                values.into_iter().map(TweenParams::to).collect(),
            ),
            PropertyRepr::Object(tween) => PropertyValue::Tween(tween),
            PropertyRepr::Frames(frames) => PropertyValue::Keyframes(frames),
        }
    }
}

/// One animation-level keyframe: property values plus optional timing.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeyframeMap {
    pub duration: Option<f64>,
    pub delay: Option<f64>,
    pub ease: Option<Easing>,
    #[serde(flatten)]
    pub values: IndexMap<String, RawValue>,
}

/// Animation-level keyframes.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum AnimationKeyframes {
    /// Sequential keyframes; timing comes from each map or the animation defaults.
    Durations(Vec<KeyframeMap>),
    /// Keys like `"0%"`, `"50%"`, `"100%"` spread over the animation duration.
    Percentages(IndexMap<String, KeyframeMap>),
}

/// Declarative animation description.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnimationParams {
    /// Default delay for each property's first keyframe.
    pub delay: Option<Param<f64>>,
    /// Default duration for each property's keyframe list.
    pub duration: Option<Param<f64>>,
    pub ease: Option<Easing>,
    pub composition: Option<Composition>,
    #[serde(skip)]
    pub modifier: Option<Modifier>,
    pub keyframes: Option<AnimationKeyframes>,
    #[serde(flatten)]
    pub playback: PlaybackParams,
    #[serde(skip)]
    pub callbacks: Callbacks,
    /// Animated properties in declaration order.
    #[serde(flatten)]
    pub properties: IndexMap<String, PropertyValue>,
}

impl AnimationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON animation document and reject out-of-range timing.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Fixed timing values must be finite and non-negative; a playback rate
    /// must be positive. Per-target functions are checked when resolved.
    pub fn validate(&self) -> crate::Result<()> {
        let timing = [
            ("duration", fixed(&self.duration)),
            ("delay", fixed(&self.delay)),
            ("loop_delay", self.playback.loop_delay),
        ];
        for (name, value) in timing {
            if let Some(ms) = value.filter(|ms| !ms.is_finite() || *ms < 0.0) {
                return Err(TweenError::InvalidParams {
                    reason: format!("{name} must be a non-negative number of ms, got {ms}"),
                });
            }
        }
        if let Some(rate) = self.playback.playback_rate.filter(|r| r.is_nan() || *r <= 0.0) {
            return Err(TweenError::InvalidParams {
                reason: format!("playback_rate must be positive, got {rate}"),
            });
        }
        Ok(())
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn duration(mut self, ms: impl Into<Param<f64>>) -> Self {
        self.duration = Some(ms.into());
        self
    }

    pub fn delay(mut self, ms: impl Into<Param<f64>>) -> Self {
        self.delay = Some(ms.into());
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }

    pub fn composition(mut self, composition: Composition) -> Self {
        self.composition = Some(composition);
        self
    }

    pub fn modifier(mut self, f: impl Fn(f64) -> f64 + 'static) -> Self {
        self.modifier = Some(Modifier::new(f));
        self
    }

    pub fn keyframes(mut self, keyframes: AnimationKeyframes) -> Self {
        self.keyframes = Some(keyframes);
        self
    }

    pub fn loops(mut self, loops: Loops) -> Self {
        self.playback.loops = Some(loops);
        self
    }

    pub fn loop_delay(mut self, ms: f64) -> Self {
        self.playback.loop_delay = Some(ms);
        self
    }

    pub fn alternate(mut self, alternate: bool) -> Self {
        self.playback.alternate = Some(alternate);
        self
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.playback.reversed = Some(reversed);
        self
    }

    pub fn autoplay(mut self, autoplay: bool) -> Self {
        self.playback.autoplay = Some(autoplay);
        self
    }

    pub fn playback_rate(mut self, rate: f64) -> Self {
        self.playback.playback_rate = Some(rate);
        self
    }

    pub fn playback_ease(mut self, ease: Easing) -> Self {
        self.playback.playback_ease = Some(ease);
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}
