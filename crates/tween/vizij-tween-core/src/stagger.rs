//! Sequence (stagger) distributor.
//!
//! `sequence` builds a per-target parameter function spreading values across
//! the target list, e.g. staggered delays `sequence(100.0, ..)` → 0, 100, 200.

use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::interp::functions::round_to;
use crate::params::ParamFn;

/// Index the distribution grows away from.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaggerFrom {
    #[default]
    First,
    Center,
    Last,
    Index(usize),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SequenceParams {
    /// Added to every output.
    pub start: f64,
    pub from: StaggerFrom,
    pub reversed: bool,
    /// Reshapes the distance curve before spacing is applied.
    pub ease: Option<Easing>,
}

/// Step between neighbours, or a range spread over the whole list.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SequenceValue {
    Step(f64),
    Range(f64, f64),
}

impl From<f64> for SequenceValue {
    fn from(step: f64) -> Self {
        SequenceValue::Step(step)
    }
}

impl From<(f64, f64)> for SequenceValue {
    fn from((a, b): (f64, f64)) -> Self {
        SequenceValue::Range(a, b)
    }
}

pub fn sequence(value: impl Into<SequenceValue>, params: SequenceParams) -> ParamFn<f64> {
    let value = value.into();
    ParamFn::new(move |_target, index, total| {
        let total = total.max(1);
        let last = (total - 1) as f64;
        let origin = match params.from {
            StaggerFrom::First => 0.0,
            StaggerFrom::Center => last / 2.0,
            StaggerFrom::Last => last,
            StaggerFrom::Index(i) => i as f64,
        };
        let distance = |k: usize| (origin - k as f64).abs();
        let max = (0..total).map(distance).fold(0.0, f64::max);
        let mut d = if index < total { distance(index) } else { 0.0 };
        if let Some(ease) = &params.ease {
            if max > 0.0 {
                d = ease.apply(d / max) * max;
            }
        }
        if params.reversed {
            d = (max - d).abs();
        }
        let (base, spacing) = match value {
            SequenceValue::Step(step) => (0.0, step),
            SequenceValue::Range(a, b) if max > 0.0 => (a, (b - a) / max),
            SequenceValue::Range(a, _) => (a, 0.0),
        };
        params.start + base + spacing * round_to(d, 2)
    })
}
