//! # Steering control module
//!
//! Drives the vehicle with the PID controller and, while tuning is enabled,
//! runs the controller gains through twiddle one simulator episode at a time.
//!
//! Each telemetry sample is one tick. The first ticks of an episode are
//! ignored while the vehicle settles, then samples are collected until the
//! trial window is full or the vehicle leaves the acceptable envelope. The
//! trial is then scored, twiddle is stepped with the score, the new gains are
//! applied and the simulator is asked to reset.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod trial;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;
pub use trial::*;

use crate::twiddle::TwiddleError;
use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SteerCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SteerCtrlError {
    #[error("Could not load the parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Invalid twiddle parameters: {0}")]
    Twiddle(TwiddleError),

    #[error("Invalid trial parameters: {0}")]
    InvalidTrialParams(String),

    #[error("Could not create the trial archive: {0}")]
    ArchiveError(ArchiveError),

    #[error("Received a non-finite measurement (cte = {cte}, speed = {speed})")]
    InvalidInput {
        cte: f64,
        speed: f64
    },

    #[error("SteerCtrl has not been initialised")]
    NotInitialised
}
