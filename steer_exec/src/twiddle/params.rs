//! Twiddle parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default factor applied to a probe size after a probe improved the score.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.25;

/// Default factor applied to a probe size after both probe directions failed.
pub const DEFAULT_DECAY_FACTOR: f64 = 0.75;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the twiddle optimiser
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Initial probe size for each optimised parameter.
    pub initial_probe_sizes: Vec<f64>,

    /// The search is complete once the sum of the probe sizes is below this
    /// value.
    pub tolerance: f64,

    /// Probe size multiplier on improvement, must be greater than 1.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Probe size multiplier when neither direction improved, must be
    /// between 0 and 1.
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            initial_probe_sizes: vec![1.0; crate::pid_ctrl::NUM_GAINS],
            tolerance: 0.1,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            decay_factor: DEFAULT_DECAY_FACTOR
        }
    }
}

fn default_growth_factor() -> f64 {
    DEFAULT_GROWTH_FACTOR
}

fn default_decay_factor() -> f64 {
    DEFAULT_DECAY_FACTOR
}
