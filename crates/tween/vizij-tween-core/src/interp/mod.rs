//! Tween interpolation and value recomposition.
//!
//! Numbers interpolate linearly. Units interpolate the number and keep the
//! suffix. Colors interpolate per channel with RGB clamped to 0..255 and
//! rounded, alpha clamped to 0..1. Templates interpolate each token and are
//! reassembled with their literal fragments.

pub mod functions;

use crate::params::Composition;
use crate::tween::Tween;
use crate::value::{Value, ValueType};
use functions::{alpha_channel, color_channel, lerp, round_to};

/// Interpolate `tween` at eased `progress`, storing the composed numbers on
/// the tween (read back by the additive pass) and returning the value.
///
/// `precision` is `None` at the endpoints so declared values come back exact.
pub(crate) fn interpolate(tween: &mut Tween, progress: f64, precision: Option<i32>) -> Value {
    let decimals = precision.unwrap_or(-1);
    let modify = |n: f64| match &tween.modifier {
        Some(m) => m.apply(n),
        None => n,
    };
    match tween.value_type {
        ValueType::Number => {
            let n = modify(lerp(tween.from_number, tween.to_number, progress));
            tween.number = n;
            Value::Number(n)
        }
        ValueType::Unit => {
            let n = modify(round_to(
                lerp(tween.from_number, tween.to_number, progress),
                decimals,
            ));
            tween.number = n;
            Value::Unit {
                number: n,
                unit: tween.unit.clone().unwrap_or_default(),
            }
        }
        ValueType::Color => {
            let channel = |i: usize| {
                lerp(
                    tween.from_numbers.get(i).copied().unwrap_or(0.0),
                    tween.to_numbers.get(i).copied().unwrap_or(0.0),
                    progress,
                )
            };
            // Blend contributions are signed offsets; the additive pass clamps the sum.
            if tween.composition == Composition::Blend {
                let raw = [
                    modify(channel(0)),
                    modify(channel(1)),
                    modify(channel(2)),
                    modify(channel(3)),
                ];
                tween.numbers.clear();
                tween.numbers.extend_from_slice(&raw);
                tween.number = raw[0];
                return Value::Color(raw);
            }
            let rgba = [
                color_channel(modify(channel(0))),
                color_channel(modify(channel(1))),
                color_channel(modify(channel(2))),
                alpha_channel(modify(round_to(channel(3), decimals))),
            ];
            tween.numbers.clear();
            tween.numbers.extend_from_slice(&rgba);
            tween.number = rgba[0];
            Value::Color(rgba)
        }
        ValueType::Complex => {
            let numbers: Vec<f64> = tween
                .to_numbers
                .iter()
                .enumerate()
                .map(|(i, to)| {
                    let from = tween.from_numbers.get(i).copied().unwrap_or(0.0);
                    modify(round_to(lerp(from, *to, progress), decimals))
                })
                .collect();
            let value = Value::Complex(assemble(&tween.strings, &numbers));
            tween.number = numbers.first().copied().unwrap_or(0.0);
            tween.numbers = numbers;
            value
        }
    }
}

/// Rebuild a value from its numeric parts.
pub(crate) fn recompose(
    value_type: ValueType,
    number: f64,
    numbers: &[f64],
    unit: Option<&str>,
    strings: &[String],
    precision: i32,
) -> Value {
    match value_type {
        ValueType::Number => Value::Number(number),
        ValueType::Unit => Value::Unit {
            number: round_to(number, precision),
            unit: unit.unwrap_or_default().to_string(),
        },
        ValueType::Color => {
            let at = |i: usize| numbers.get(i).copied().unwrap_or(0.0);
            Value::Color([
                color_channel(at(0)),
                color_channel(at(1)),
                color_channel(at(2)),
                alpha_channel(round_to(at(3), precision)),
            ])
        }
        ValueType::Complex => {
            let rounded: Vec<f64> = numbers.iter().map(|n| round_to(*n, precision)).collect();
            Value::Complex(assemble(strings, &rounded))
        }
    }
}

fn assemble(strings: &[String], numbers: &[f64]) -> String {
    let mut out = strings.first().cloned().unwrap_or_default();
    for (i, n) in numbers.iter().enumerate() {
        out.push_str(&n.to_string());
        if let Some(s) = strings.get(i + 1) {
            out.push_str(s);
        }
    }
    out
}
