//! Damped harmonic oscillator used as an easing curve.
//!
//! The solver walks the analytic solution in fixed steps until the
//! displacement has stayed under the rest threshold for a full rest window;
//! that walk length becomes the settling duration.

use serde::{Deserialize, Serialize};

use crate::config::{K, MIN_VALUE};

/// Solver step in seconds.
const TIME_STEP: f64 = 0.02;
const REST_THRESHOLD: f64 = 0.0005;
/// Seconds the spring must stay at rest before it counts as settled.
const REST_DURATION: f64 = 0.2;
const MAX_DURATION: f64 = 60.0;

/// Spring configuration (physics parameters).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringParams {
    pub mass: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub velocity: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 100.0,
            damping: 10.0,
            velocity: 0.0,
        }
    }
}

impl SpringParams {
    /// Gentle, slow spring
    pub fn gentle() -> Self {
        Self {
            stiffness: 120.0,
            damping: 14.0,
            ..Self::default()
        }
    }

    /// Wobbly spring with overshoot
    pub fn wobbly() -> Self {
        Self {
            stiffness: 180.0,
            damping: 12.0,
            ..Self::default()
        }
    }

    /// Stiff, snappy spring
    pub fn stiff() -> Self {
        Self {
            stiffness: 400.0,
            damping: 30.0,
            ..Self::default()
        }
    }
}

/// A solved spring: an easing curve plus the time it needs to settle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    params: SpringParams,
    w0: f64,
    zeta: f64,
    wd: f64,
    b: f64,
    /// Seconds of solver time mapped onto progress 0..1.
    solver_duration: f64,
    /// Settling duration in milliseconds.
    duration: f64,
}

/// Build a spring, clamping every parameter into a stable range.
pub fn create_spring(params: SpringParams) -> Spring {
    Spring::new(params)
}

impl Spring {
    pub fn new(params: SpringParams) -> Self {
        let params = SpringParams {
            mass: params.mass.clamp(MIN_VALUE, 10_000.0),
            stiffness: params.stiffness.clamp(1.0, 10_000.0),
            damping: params.damping.clamp(0.1, 10_000.0),
            velocity: params.velocity.clamp(-10_000.0, 10_000.0),
        };
        let mut spring = Self {
            params,
            w0: 0.0,
            zeta: 0.0,
            wd: 0.0,
            b: 0.0,
            solver_duration: 0.0,
            duration: 0.0,
        };
        spring.compute();
        spring
    }

    #[inline]
    pub fn params(&self) -> SpringParams {
        self.params
    }

    /// Milliseconds until the spring comes to rest.
    #[inline]
    pub fn settling_duration(&self) -> f64 {
        self.duration
    }

    /// Eased progress at normalized time `t`.
    pub fn ease(&self, t: f64) -> f64 {
        if t <= 0.0 || t >= 1.0 {
            return t.clamp(0.0, 1.0);
        }
        self.solve(t * self.solver_duration)
    }

    fn solve(&self, time: f64) -> f64 {
        let displacement = if self.zeta < 1.0 {
            (-time * self.zeta * self.w0).exp()
                * ((self.wd * time).cos() + self.b * (self.wd * time).sin())
        } else {
            (1.0 + self.b * time) * (-time * self.w0).exp()
        };
        1.0 - displacement
    }

    fn compute(&mut self) {
        let SpringParams {
            mass: m,
            stiffness: s,
            damping: d,
            velocity: v,
        } = self.params;
        self.w0 = (s / m).sqrt().clamp(MIN_VALUE, K);
        self.zeta = d / (2.0 * (s * m).sqrt());
        if self.zeta < 1.0 {
            self.wd = self.w0 * (1.0 - self.zeta * self.zeta).sqrt();
            self.b = (self.zeta * self.w0 - v) / self.wd;
        } else {
            self.wd = 0.0;
            self.b = self.w0 - v;
        }

        let max_rest_steps = (REST_DURATION / TIME_STEP).round() as u32;
        let max_iterations = (MAX_DURATION / TIME_STEP).round() as u32;
        let mut solver_time = 0.0;
        let mut rest_steps = 0;
        let mut iterations = 0;
        while rest_steps < max_rest_steps && iterations < max_iterations {
            if (1.0 - self.solve(solver_time)).abs() < REST_THRESHOLD {
                rest_steps += 1;
            } else {
                rest_steps = 0;
            }
            self.solver_duration = solver_time;
            solver_time += TIME_STEP;
            iterations += 1;
        }
        self.duration = (self.solver_duration * K).round();
    }
}

impl Default for Spring {
    fn default() -> Self {
        Self::new(SpringParams::default())
    }
}
