//! Parameters structure for SteerCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::SteerCtrlError;
use crate::{pid_ctrl::Gains, twiddle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for steering control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    /// Constant throttle sent with every steer command.
    pub throttle: f64,

    /// If false the controller drives with `initial_gains` and never tunes.
    #[serde(default = "default_tuning_enabled")]
    pub tuning_enabled: bool,

    /// Gains used for the first episode.
    pub initial_gains: Gains,

    /// Gain search parameters.
    pub twiddle: twiddle::Params,

    /// Trial timing and termination parameters.
    pub trial: TrialParams
}

/// Parameters controlling how each trial is run and scored.
#[derive(Debug, Clone, Deserialize)]
pub struct TrialParams {

    // ---- TIMING ----

    /// Early termination is not checked until the episode tick counter is
    /// greater than this value.
    pub grace_ticks: u64,

    /// Samples are not collected until the episode tick counter is greater
    /// than this value.
    pub ignore_ticks: u64,

    /// Number of samples in a full trial.
    pub window_ticks: usize,

    // ---- EARLY TERMINATION ----

    /// Maximum absolute cross track error.
    pub max_abs_cte: f64,

    /// Minimum speed.
    pub min_speed: f64,

    /// Maximum number of ticks in an episode, no limit if not given.
    #[serde(default)]
    pub max_episode_ticks: Option<u64>,

    // ---- WIDENING ----

    /// Grow the ignore window every this many scored episodes, 0 disables
    /// widening.
    #[serde(default)]
    pub widen_every_n_episodes: u64,

    /// Number of ticks added to the ignore window each time it grows.
    #[serde(default)]
    pub widen_by_ticks: u64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            throttle: 0.3,
            tuning_enabled: true,
            initial_gains: Gains::default(),
            twiddle: twiddle::Params::default(),
            trial: TrialParams::default()
        }
    }
}

impl Default for TrialParams {
    fn default() -> Self {
        Self {
            grace_ticks: 100,
            ignore_ticks: 200,
            window_ticks: 400,
            max_abs_cte: 4.0,
            min_speed: 5.0,
            max_episode_ticks: None,
            widen_every_n_episodes: 6,
            widen_by_ticks: 200
        }
    }
}

impl TrialParams {
    /// Check the parameters describe a trial that can be scored.
    pub fn validate(&self) -> Result<(), SteerCtrlError> {
        if self.window_ticks == 0 {
            return Err(SteerCtrlError::InvalidTrialParams(
                "window_ticks must be greater than zero".into()
            ))
        }

        if !self.max_abs_cte.is_finite() || self.max_abs_cte <= 0.0 {
            return Err(SteerCtrlError::InvalidTrialParams(format!(
                "max_abs_cte must be finite and positive, found {}",
                self.max_abs_cte
            )))
        }

        if !self.min_speed.is_finite() {
            return Err(SteerCtrlError::InvalidTrialParams(format!(
                "min_speed must be finite, found {}",
                self.min_speed
            )))
        }

        if self.max_episode_ticks == Some(0) {
            return Err(SteerCtrlError::InvalidTrialParams(
                "max_episode_ticks must be greater than zero when given".into()
            ))
        }

        Ok(())
    }
}

fn default_tuning_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
