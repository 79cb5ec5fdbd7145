//! # Twiddle module
//!
//! Twiddle is a derivative-free coordinate descent optimiser. It nudges one
//! parameter at a time up and then down by a probe size, keeping whichever
//! change lowered the score. Probe sizes grow after a successful probe and
//! shrink after a failed one, and the search is finished once the sum of
//! probe sizes drops below the tolerance. It is prone to finding a local
//! minimum.
//!
//! The optimiser is resumable: each call to [`Twiddle::step`] consumes the
//! score of the last evaluation and leaves the parameters ready for the next
//! evaluation, so a whole simulation episode can run between calls.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Invalid twiddle configurations, rejected when the optimiser is created.
#[derive(Debug, thiserror::Error)]
pub enum TwiddleError {
    #[error("Twiddle needs at least one parameter to optimise")]
    NoParameters,

    #[error("Expected {expected} initial probe sizes, found {found}")]
    ProbeSizeCount {
        expected: usize,
        found: usize
    },

    #[error("Probe size {index} must be finite and non-negative, found {value}")]
    InvalidProbeSize {
        index: usize,
        value: f64
    },

    #[error("The tolerance must be finite and positive, found {0}")]
    InvalidTolerance(f64),

    #[error("The growth factor must be finite and greater than 1, found {0}")]
    InvalidGrowthFactor(f64),

    #[error("The decay factor must be between 0 and 1 (exclusive), found {0}")]
    InvalidDecayFactor(f64)
}
