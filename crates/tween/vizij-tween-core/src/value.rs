//! Animated values and their decomposition into interpolatable parts.
//!
//! A raw value (`10`, `"10px"`, `"+=50"`, `"#ff0000"`, `"rotate(45deg) scale(2)"`)
//! decomposes into a number, a number plus unit suffix, four color channels,
//! or a template of numeric tokens between literal fragments. Anything that
//! cannot be parsed decomposes to a zero number and logs a warning.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Composed value handed to a `ValueIo` writer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    Number(f64),
    Unit { number: f64, unit: String },
    /// RGBA; channels 0..255, alpha 0..1.
    Color([f64; 4]),
    Complex(String),
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Unit,
    Color,
    Complex,
}

impl Value {
    #[inline]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Number(_) => ValueType::Number,
            Value::Unit { .. } => ValueType::Unit,
            Value::Color(_) => ValueType::Color,
            Value::Complex(_) => ValueType::Complex,
        }
    }

    /// Primary numeric component (red channel for colors, first token for templates).
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) | Value::Unit { number: n, .. } => *n,
            Value::Color(c) => c[0],
            Value::Complex(_) => Decomposed::from(self).numbers.first().copied().unwrap_or(0.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Unit { number, unit } => write!(f, "{number}{unit}"),
            Value::Color([r, g, b, a]) => write!(f, "rgba({r},{g},{b},{a})"),
            Value::Complex(s) => f.write_str(s),
        }
    }
}

/// Declared value before decomposition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        RawValue::Number(n as f64)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => RawValue::Number(*n),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// Relative operator prefix (`+=`, `-=`, `*=`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelativeOp {
    Add,
    Sub,
    Mul,
}

impl RelativeOp {
    #[inline]
    pub fn apply(self, base: f64, operand: f64) -> f64 {
        match self {
            RelativeOp::Add => base + operand,
            RelativeOp::Sub => base - operand,
            RelativeOp::Mul => base * operand,
        }
    }
}

/// Interpolatable parts of a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Decomposed {
    pub value_type: ValueType,
    pub number: f64,
    pub unit: Option<String>,
    /// Color channels or template tokens.
    pub numbers: Vec<f64>,
    /// Literal fragments around template tokens; `numbers.len() + 1` entries.
    pub strings: Vec<String>,
    pub operator: Option<RelativeOp>,
}

impl Decomposed {
    pub fn number(n: f64) -> Self {
        Self {
            value_type: ValueType::Number,
            number: n,
            unit: None,
            numbers: Vec::new(),
            strings: Vec::new(),
            operator: None,
        }
    }

    pub fn unit(n: f64, unit: impl Into<String>) -> Self {
        Self {
            value_type: ValueType::Unit,
            unit: Some(unit.into()),
            ..Self::number(n)
        }
    }

    pub fn color(rgba: [f64; 4]) -> Self {
        Self {
            value_type: ValueType::Color,
            number: rgba[0],
            numbers: rgba.to_vec(),
            ..Self::number(0.0)
        }
    }

    /// Resolve a relative operator against `base`, consuming it.
    pub fn resolve_relative(&mut self, base: &Decomposed) {
        let Some(op) = self.operator.take() else {
            return;
        };
        match self.value_type {
            ValueType::Number | ValueType::Unit => {
                self.number = op.apply(base.number, self.number);
                if self.unit.is_none() {
                    if let Some(unit) = &base.unit {
                        self.unit = Some(unit.clone());
                        self.value_type = ValueType::Unit;
                    }
                }
            }
            ValueType::Color | ValueType::Complex => {
                for (i, n) in self.numbers.iter_mut().enumerate() {
                    let b = base.numbers.get(i).copied().unwrap_or(0.0);
                    *n = op.apply(b, *n);
                }
            }
        }
    }
}

impl From<&Value> for Decomposed {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => Decomposed::number(*n),
            Value::Unit { number, unit } => Decomposed::unit(*number, unit.clone()),
            Value::Color(c) => Decomposed::color(*c),
            Value::Complex(s) => decompose_text(s),
        }
    }
}

/// Decompose a declared value. Never fails; unparseable text becomes `0`.
pub fn decompose(raw: &RawValue) -> Decomposed {
    match raw {
        RawValue::Number(n) if n.is_finite() => Decomposed::number(*n),
        RawValue::Number(n) => {
            warn!(value = %n, "non-finite value decomposed to 0");
            Decomposed::number(0.0)
        }
        RawValue::Text(s) => decompose_text(s),
    }
}

fn decompose_text(raw: &str) -> Decomposed {
    let trimmed = raw.trim();
    let (operator, body) = match trimmed.get(..2) {
        Some("+=") => (Some(RelativeOp::Add), trimmed[2..].trim_start()),
        Some("-=") => (Some(RelativeOp::Sub), trimmed[2..].trim_start()),
        Some("*=") => (Some(RelativeOp::Mul), trimmed[2..].trim_start()),
        _ => (None, trimmed),
    };

    let mut decomposed = if let Some(rgba) = parse_color(body) {
        Decomposed::color(rgba)
    } else if let Some((n, rest)) = parse_number_prefix(body) {
        if rest.is_empty() {
            Decomposed::number(n)
        } else if is_unit(rest) {
            Decomposed::unit(n, rest)
        } else {
            template(body)
        }
    } else {
        template(body)
    };

    if decomposed.value_type == ValueType::Complex && decomposed.numbers.is_empty() {
        warn!(value = raw, "value has no numeric component; using 0");
        decomposed = Decomposed::number(0.0);
    }
    decomposed.operator = operator;
    decomposed
}

fn is_unit(rest: &str) -> bool {
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic() || c == '%')
}

/// Longest numeric prefix: optional sign, digits with one dot, optional exponent.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i = 1;
    }
    let mantissa_start = i;
    let mut seen_dot = false;
    let mut digits = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        i += 1;
    }
    if digits == 0 {
        return 0;
    }
    // A trailing dot is not part of the number.
    if bytes[i - 1] == b'.' && i - 1 > mantissa_start {
        i -= 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

fn parse_number_prefix(s: &str) -> Option<(f64, &str)> {
    let len = number_len(s);
    if len == 0 {
        return None;
    }
    let n = s[..len].parse::<f64>().ok()?;
    Some((n, &s[len..]))
}

fn template(s: &str) -> Decomposed {
    let mut numbers = Vec::new();
    let mut strings = Vec::new();
    let mut literal = String::new();
    let mut rest = s;
    while !rest.is_empty() {
        // Signs only start a token at a boundary, so "a-b" stays literal.
        let at_boundary = literal
            .chars()
            .last()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        let starts_number = rest.as_bytes()[0].is_ascii_digit()
            || ((rest.starts_with('-') || rest.starts_with('+') || rest.starts_with('.'))
                && at_boundary);
        if starts_number && !literal.ends_with('#') {
            if let Some((n, tail)) = parse_number_prefix(rest) {
                numbers.push(n);
                strings.push(std::mem::take(&mut literal));
                rest = tail;
                continue;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }
    strings.push(literal);
    Decomposed {
        value_type: ValueType::Complex,
        number: numbers.first().copied().unwrap_or(0.0),
        unit: None,
        numbers,
        strings,
        operator: None,
    }
}

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`, `hsl()`, `hsla()`.
pub fn parse_color(s: &str) -> Option<[f64; 4]> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let open = s.find('(')?;
    let name = s[..open].trim().to_ascii_lowercase();
    let inner = s[open + 1..].strip_suffix(')')?;
    let parts: Vec<&str> = inner
        .split(|c| c == ',' || c == '/' || c == ' ')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let channel = |i: usize| -> Option<f64> {
        let p = parts.get(i)?;
        match p.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().ok().map(|v| v / 100.0),
            None => p.parse::<f64>().ok(),
        }
    };
    let alpha = if parts.len() > 3 { channel(3)? } else { 1.0 };
    match name.as_str() {
        "rgb" | "rgba" => {
            let scale = |i: usize| -> Option<f64> {
                let v = channel(i)?;
                Some(if parts[i].ends_with('%') { v * 255.0 } else { v })
            };
            Some([scale(0)?, scale(1)?, scale(2)?, alpha.clamp(0.0, 1.0)])
        }
        "hsl" | "hsla" => {
            let h = parts.first()?.trim_end_matches("deg").parse::<f64>().ok()?;
            let (r, g, b) = hsl_to_rgb(h, channel(1)?, channel(2)?);
            Some([r, g, b, alpha.clamp(0.0, 1.0)])
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<[f64; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| (v * 17) as f64);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(f64::from);
    match hex.len() {
        3 => Some([nibble(0)?, nibble(1)?, nibble(2)?, 1.0]),
        4 => Some([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)? / 255.0]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 1.0]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)? / 255.0]),
        _ => None,
    }
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        let v = l * 255.0;
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f64| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    (
        hue(h + 1.0 / 3.0) * 255.0,
        hue(h) * 255.0,
        hue(h - 1.0 / 3.0) * 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers_and_units() {
        assert_eq!(decompose(&RawValue::from(12.5)), Decomposed::number(12.5));
        assert_eq!(decompose(&"-3".into()), Decomposed::number(-3.0));
        let d = decompose(&"10px".into());
        assert_eq!(d.value_type, ValueType::Unit);
        assert_eq!(d.number, 10.0);
        assert_eq!(d.unit.as_deref(), Some("px"));
        assert_eq!(decompose(&"50%".into()).unit.as_deref(), Some("%"));
    }

    #[test]
    fn relative_prefix_is_split_off() {
        let mut d = decompose(&"+=50".into());
        assert_eq!(d.operator, Some(RelativeOp::Add));
        d.resolve_relative(&Decomposed::unit(10.0, "px"));
        assert_eq!(d.number, 60.0);
        assert_eq!(d.unit.as_deref(), Some("px"));
        assert!(d.operator.is_none());

        let mut m = decompose(&"*= 2".into());
        m.resolve_relative(&Decomposed::number(4.0));
        assert_eq!(m.number, 8.0);
    }

    #[test]
    fn colors_decompose_to_channels() {
        assert_eq!(parse_color("#f00"), Some([255.0, 0.0, 0.0, 1.0]));
        assert_eq!(parse_color("#00ff0080").map(|c| c[1]), Some(255.0));
        assert_eq!(parse_color("rgba(10, 20, 30, .5)"), Some([10.0, 20.0, 30.0, 0.5]));
        let hsl = parse_color("hsl(120, 100%, 50%)").unwrap();
        assert!((hsl[1] - 255.0).abs() < 1e-9 && hsl[0].abs() < 1e-9);
        let d = decompose(&"#ffffff".into());
        assert_eq!(d.value_type, ValueType::Color);
        assert_eq!(d.numbers, vec![255.0, 255.0, 255.0, 1.0]);
    }

    #[test]
    fn templates_keep_literal_fragments() {
        let d = decompose(&"translate(10px, -5.5px) scale(2)".into());
        assert_eq!(d.value_type, ValueType::Complex);
        assert_eq!(d.numbers, vec![10.0, -5.5, 2.0]);
        assert_eq!(d.strings, vec!["translate(", "px, ", "px) scale(", ")"]);
    }

    #[test]
    fn garbage_fails_soft_to_zero() {
        let d = decompose(&"auto".into());
        assert_eq!(d, Decomposed::number(0.0));
        assert_eq!(decompose(&RawValue::Number(f64::NAN)).number, 0.0);
    }

    #[test]
    fn value_serde_is_adjacently_tagged() {
        let json = serde_json::to_string(&Value::Number(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"Number","data":1.5}"#);
        let raw: RawValue = serde_json::from_str("\"10px\"").unwrap();
        assert_eq!(raw, RawValue::Text("10px".into()));
    }
}
