//! Interpolation helpers:
//! - lerp (scalar)
//! - round_to (fixed decimal precision)
//! - color channel clamping

/// Linear interpolation of scalars. Exact at both ends.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Round to `decimals` places. Negative precision leaves the value untouched.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if decimals < 0 {
        return value;
    }
    if decimals == 0 {
        return value.round();
    }
    let m = 10f64.powi(decimals);
    (value * m).round() / m
}

/// RGB channel: clamp to 0..255 and round to an integer.
#[inline]
pub fn color_channel(value: f64) -> f64 {
    value.clamp(0.0, 255.0).round()
}

/// Alpha channel: clamp to 0..1.
#[inline]
pub fn alpha_channel(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
