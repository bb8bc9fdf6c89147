//! Easing functions: `progress (0..1) -> eased progress`.
//!
//! Easings can be built directly or parsed from their string names
//! (`"linear"`, `"outQuad"`, `"inOut(3)"`, `"outBack(2)"`, `"steps(4)"`,
//! `"cubicBezier(.2,0,.4,1)"`). Unknown names parse to an error; the
//! animation builder falls back to the configured default ease.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TweenError;
use crate::spring::Spring;

/// User-supplied easing function.
#[derive(Clone)]
pub struct EaseFn(pub Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl EaseFn {
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for EaseFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EaseFn(..)")
    }
}

/// Direction variants applied to a base "in" curve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
    OutIn,
}

/// Non-polynomial base curves.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Curve {
    Sine,
    Circ,
    Expo,
    /// Overshoot amount.
    Back(f64),
    /// Amplitude and period.
    Elastic(f64, f64),
    Bounce,
}

/// Easing function type
#[derive(Clone, Debug, Default)]
pub enum Easing {
    #[default]
    Linear,
    /// `t^p`
    In(f64),
    Out(f64),
    InOut(f64),
    OutIn(f64),
    Curve(Curve, Direction),
    Steps {
        steps: u32,
        jump_start: bool,
    },
    CubicBezier(f64, f64, f64, f64),
    Spring(Spring),
    Custom(EaseFn),
}

impl Easing {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::In(p) => directed(t, Direction::In, |x| x.powf(*p)),
            Easing::Out(p) => directed(t, Direction::Out, |x| x.powf(*p)),
            Easing::InOut(p) => directed(t, Direction::InOut, |x| x.powf(*p)),
            Easing::OutIn(p) => directed(t, Direction::OutIn, |x| x.powf(*p)),
            Easing::Curve(curve, dir) => directed(t, *dir, |x| curve_in(*curve, x)),
            Easing::Steps { steps, jump_start } => {
                let n = (*steps).max(1) as f64;
                let stepped = if *jump_start {
                    (t * n).ceil() / n
                } else {
                    (t * n).floor() / n
                };
                stepped.clamp(0.0, 1.0)
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
            Easing::Spring(spring) => spring.ease(t),
            Easing::Custom(f) => (f.0)(t),
        }
    }

    /// Settling duration when the ease carries its own timing (springs).
    pub fn intrinsic_duration(&self) -> Option<f64> {
        match self {
            Easing::Spring(spring) => Some(spring.settling_duration()),
            _ => None,
        }
    }

    pub fn custom(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Easing::Custom(EaseFn::new(f))
    }
}

fn directed(t: f64, dir: Direction, ease_in: impl Fn(f64) -> f64) -> f64 {
    match dir {
        Direction::In => ease_in(t),
        Direction::Out => 1.0 - ease_in(1.0 - t),
        Direction::InOut => {
            if t < 0.5 {
                ease_in(t * 2.0) / 2.0
            } else {
                1.0 - ease_in(t * -2.0 + 2.0) / 2.0
            }
        }
        Direction::OutIn => {
            if t < 0.5 {
                (1.0 - ease_in(1.0 - t * 2.0)) / 2.0
            } else {
                (ease_in(t * 2.0 - 1.0) + 1.0) / 2.0
            }
        }
    }
}

fn curve_in(curve: Curve, t: f64) -> f64 {
    match curve {
        Curve::Sine => 1.0 - (t * PI / 2.0).cos(),
        Curve::Circ => 1.0 - (1.0 - t * t).max(0.0).sqrt(),
        Curve::Expo => {
            if t == 0.0 {
                0.0
            } else {
                2f64.powf(10.0 * t - 10.0)
            }
        }
        Curve::Back(overshoot) => (overshoot + 1.0) * t * t * t - overshoot * t * t,
        Curve::Elastic(amplitude, period) => {
            if t == 0.0 || t == 1.0 {
                return t;
            }
            let a = amplitude.clamp(1.0, 10.0);
            let p = period.clamp(1e-11, 2.0);
            let tau = PI * 2.0;
            let s = (p / tau) * (1.0 / a).asin();
            let e = tau / p;
            -a * 2f64.powf(-10.0 * (1.0 - t)) * (((1.0 - t) - s) * e).sin()
        }
        Curve::Bounce => {
            let mut b = 4.0;
            let mut pow2;
            loop {
                b -= 1.0;
                pow2 = 2f64.powf(b);
                if t >= (pow2 - 1.0) / 11.0 || b <= 0.0 {
                    break;
                }
            }
            1.0 / 4f64.powf(3.0 - b) - 7.5625 * ((pow2 * 3.0 - 2.0) / 22.0 - t).powi(2)
        }
    }
}

/// Cubic bezier easing, solved the way browsers evaluate CSS `cubic-bezier()`.
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
fn cubic_bezier_ease(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let mut p = t;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - t;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = t;
    for _ in 0..30 {
        let val = bezier_sample(p, x1, x2);
        if (val - t).abs() < 1e-7 {
            break;
        }
        if val < t {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2)
}

#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}

fn parse_args(raw: &str) -> Result<Vec<f64>, TweenError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| TweenError::UnknownEasing {
                name: raw.to_string(),
            })
        })
        .collect()
}

impl FromStr for Easing {
    type Err = TweenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TweenError::UnknownEasing {
            name: s.to_string(),
        };
        let trimmed = s.trim();
        let (name, args) = match trimmed.find('(') {
            Some(open) => {
                let close = trimmed.rfind(')').ok_or_else(unknown)?;
                if close < open {
                    return Err(unknown());
                }
                (&trimmed[..open], parse_args(&trimmed[open + 1..close])?)
            }
            None => (trimmed, Vec::new()),
        };
        let arg = |i: usize, fallback: f64| args.get(i).copied().unwrap_or(fallback);

        match name {
            "linear" | "none" => return Ok(Easing::Linear),
            "steps" => {
                return Ok(Easing::Steps {
                    steps: arg(0, 10.0).max(1.0) as u32,
                    jump_start: arg(1, 0.0) != 0.0,
                })
            }
            "cubicBezier" => {
                if args.len() != 4 {
                    return Err(unknown());
                }
                return Ok(Easing::CubicBezier(args[0], args[1], args[2], args[3]));
            }
            _ => {}
        }

        let (dir, base) = if let Some(rest) = name.strip_prefix("inOut") {
            (Direction::InOut, rest)
        } else if let Some(rest) = name.strip_prefix("outIn") {
            (Direction::OutIn, rest)
        } else if let Some(rest) = name.strip_prefix("in") {
            (Direction::In, rest)
        } else if let Some(rest) = name.strip_prefix("out") {
            (Direction::Out, rest)
        } else {
            return Err(unknown());
        };

        let power = match base {
            "" => Some(arg(0, 1.675)),
            "Quad" => Some(2.0),
            "Cubic" => Some(3.0),
            "Quart" => Some(4.0),
            "Quint" => Some(5.0),
            _ => None,
        };
        if let Some(p) = power {
            return Ok(match dir {
                Direction::In => Easing::In(p),
                Direction::Out => Easing::Out(p),
                Direction::InOut => Easing::InOut(p),
                Direction::OutIn => Easing::OutIn(p),
            });
        }

        let curve = match base {
            "Sine" => Curve::Sine,
            "Circ" => Curve::Circ,
            "Expo" => Curve::Expo,
            "Back" => Curve::Back(arg(0, 1.70158)),
            "Elastic" => Curve::Elastic(arg(0, 1.0), arg(1, 0.3)),
            "Bounce" => Curve::Bounce,
            _ => return Err(unknown()),
        };
        Ok(Easing::Curve(curve, dir))
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn dir_name(dir: Direction) -> &'static str {
            match dir {
                Direction::In => "in",
                Direction::Out => "out",
                Direction::InOut => "inOut",
                Direction::OutIn => "outIn",
            }
        }
        match self {
            Easing::Linear => f.write_str("linear"),
            Easing::In(p) => write!(f, "in({p})"),
            Easing::Out(p) => write!(f, "out({p})"),
            Easing::InOut(p) => write!(f, "inOut({p})"),
            Easing::OutIn(p) => write!(f, "outIn({p})"),
            Easing::Curve(curve, dir) => {
                let d = dir_name(*dir);
                match curve {
                    Curve::Sine => write!(f, "{d}Sine"),
                    Curve::Circ => write!(f, "{d}Circ"),
                    Curve::Expo => write!(f, "{d}Expo"),
                    Curve::Back(o) => write!(f, "{d}Back({o})"),
                    Curve::Elastic(a, p) => write!(f, "{d}Elastic({a},{p})"),
                    Curve::Bounce => write!(f, "{d}Bounce"),
                }
            }
            Easing::Steps { steps, jump_start } => {
                write!(f, "steps({steps},{})", u8::from(*jump_start))
            }
            Easing::CubicBezier(a, b, c, d) => write!(f, "cubicBezier({a},{b},{c},{d})"),
            Easing::Spring(_) => f.write_str("spring"),
            Easing::Custom(_) => f.write_str("custom"),
        }
    }
}

impl Serialize for Easing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "left={a} right={b}");
    }

    #[test]
    fn endpoints_are_exact() {
        let all = [
            "linear",
            "inQuad",
            "outQuad",
            "inOutCubic",
            "outInQuart",
            "inSine",
            "outCirc",
            "inOutExpo",
            "outBounce",
            "inElastic",
            "cubicBezier(.25,.1,.25,1)",
        ];
        for name in all {
            let ease: Easing = name.parse().expect(name);
            approx(ease.apply(0.0), 0.0);
            approx(ease.apply(1.0), 1.0);
        }
    }

    #[test]
    fn power_family_matches_closed_form() {
        let out_quad: Easing = "outQuad".parse().unwrap();
        approx(out_quad.apply(0.5), 0.75);
        let in_cubic: Easing = "inCubic".parse().unwrap();
        approx(in_cubic.apply(0.5), 0.125);
        let in_out: Easing = "inOut(2)".parse().unwrap();
        approx(in_out.apply(0.25), 0.125);
        approx(in_out.apply(0.5), 0.5);
    }

    #[test]
    fn steps_hold_until_boundary() {
        let ease: Easing = "steps(4)".parse().unwrap();
        approx(ease.apply(0.2), 0.0);
        approx(ease.apply(0.26), 0.25);
        approx(ease.apply(0.99), 0.75);
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!("wobble".parse::<Easing>().is_err());
        assert!("cubicBezier(1,2)".parse::<Easing>().is_err());
        assert!("inQuad(".parse::<Easing>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let ease: Easing = serde_json::from_str("\"inOutQuad\"").unwrap();
        approx(ease.apply(0.5), 0.5);
        let json = serde_json::to_string(&Easing::Out(2.0)).unwrap();
        assert_eq!(json, "\"out(2)\"");
    }
}
