//! # PID steering controller
//!
//! Converts the cross track error sequence into a bounded steering correction.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::fmt;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of gains in the controller.
pub const NUM_GAINS: usize = 3;

/// Minimum steering correction.
pub const MIN_CORRECTION: f64 = -1.0;

/// Maximum steering correction.
pub const MAX_CORRECTION: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The controller gains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64
}

/// A PID controller
///
/// The integral is the plain sum of every error passed in, there is no time
/// step, windowing or anti-windup.
#[derive(Debug, Default, Serialize, Clone)]
pub struct PidController {
    gains: Gains,

    /// Previous error, zero before the first call
    prev_error: f64,

    /// The integral accumulation
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gains {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    pub fn to_array(&self) -> [f64; NUM_GAINS] {
        [self.k_p, self.k_i, self.k_d]
    }
}

impl From<[f64; NUM_GAINS]> for Gains {
    fn from(a: [f64; NUM_GAINS]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl fmt::Display for Gains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k_p = {}, k_i = {}, k_d = {}", self.k_p, self.k_i, self.k_d)
    }
}

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            prev_error: 0f64,
            integral: 0f64
        }
    }

    /// Get the steering correction for the given error.
    ///
    /// The output is always within `[MIN_CORRECTION, MAX_CORRECTION]`.
    pub fn compute(&mut self, error: f64) -> f64 {
        self.integral += error;

        let out = -(
            self.gains.k_p * error
            + self.gains.k_i * self.integral
            + self.gains.k_d * (error - self.prev_error)
        );

        self.prev_error = error;

        out.max(MIN_CORRECTION).min(MAX_CORRECTION)
    }

    /// Replace the gains.
    ///
    /// The integral and previous error are kept, so the next call continues
    /// from the existing history.
    pub fn reconfigure(&mut self, gains: Gains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_saturates_proportional() {
        let mut pid = PidController::new(Gains::new(1.0, 0.0, 0.0));

        let out: Vec<f64> = [1.0, 1.0, 1.0].iter().map(|e| pid.compute(*e)).collect();

        assert_eq!(out, vec![-1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_terms() {
        let mut pid = PidController::new(Gains::new(0.1, 0.01, 0.5));

        // -(0.1*0.5 + 0.01*0.5 + 0.5*(0.5 - 0))
        assert!((pid.compute(0.5) - -0.305).abs() < 1e-12);

        // -(0.1*0.3 + 0.01*0.8 + 0.5*(0.3 - 0.5))
        assert!((pid.compute(0.3) - 0.062).abs() < 1e-12);

        assert_eq!(pid.prev_error(), 0.3);
    }

    #[test]
    fn test_output_always_bounded() {
        let mut pid = PidController::new(Gains::new(3.0, 0.5, 20.0));

        let errors = [0.0, 10.0, -50.0, 1e6, -1e6, 0.001, 7.5, -7.5, 1e-9, 0.0];

        for e in errors.iter() {
            let out = pid.compute(*e);
            assert!(out >= MIN_CORRECTION && out <= MAX_CORRECTION, "{} out of range", out);
        }
    }

    #[test]
    fn test_integral_is_running_sum() {
        let mut pid = PidController::new(Gains::new(0.2, 0.004, 3.0));

        let errors = [0.25, -1.0, 3.5, 0.125, -0.375, 2.0];
        let mut sum = 0.0;

        for e in errors.iter() {
            pid.compute(*e);
            sum += *e;
            assert_eq!(pid.integral(), sum);
        }
    }

    #[test]
    fn test_reconfigure_keeps_history() {
        let mut pid = PidController::new(Gains::new(0.0, 0.0, 0.0));

        pid.compute(0.5);
        pid.compute(0.25);

        let new_gains = Gains::new(0.0, 1.0, 0.0);
        pid.reconfigure(new_gains);

        assert_eq!(pid.gains(), new_gains);
        assert_eq!(pid.integral(), 0.75);
        assert_eq!(pid.prev_error(), 0.25);

        // Integral continues from 0.75
        assert_eq!(pid.compute(0.0), -0.75);
    }

    #[test]
    fn test_gains_conversions() {
        let gains = Gains::from([0.2, 0.004, 3.0]);

        assert_eq!(gains, Gains::new(0.2, 0.004, 3.0));
        assert_eq!(gains.to_array(), [0.2, 0.004, 3.0]);
        assert_eq!(format!("{}", gains), "k_p = 0.2, k_i = 0.004, k_d = 3");
    }
}
