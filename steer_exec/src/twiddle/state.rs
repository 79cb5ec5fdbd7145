//! Twiddle optimiser state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{Params, TwiddleError};
use util::maths;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Twiddle optimiser over `N` parameters.
#[derive(Debug, Clone)]
pub struct Twiddle<const N: usize> {
    tolerance: f64,
    growth_factor: f64,
    decay_factor: f64,

    /// Current step size of each parameter
    probe_sizes: [f64; N],

    /// Position of the state machine
    state: TwiddleState,

    /// Index of the parameter being probed
    cursor: usize,

    /// Best score seen so far, `None` until the first call to `step`
    best_score: Option<f64>,

    /// Parameters which achieved the best score
    best_params: [f64; N]
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Twiddle state machine positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TwiddleState {
    /// Check for convergence, then increase the current parameter.
    ProbeUp,

    /// Judge the increase. On failure try the same step below the baseline.
    ProbeDown,

    /// Judge the decrease. On failure restore the baseline, shrink the probe
    /// and move straight on to probing the next parameter.
    Conclude
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<const N: usize> Twiddle<N> {
    /// Create a new optimiser, validating the parameters.
    pub fn new(params: &Params) -> Result<Self, TwiddleError> {
        if N == 0 {
            return Err(TwiddleError::NoParameters)
        }

        if params.initial_probe_sizes.len() != N {
            return Err(TwiddleError::ProbeSizeCount {
                expected: N,
                found: params.initial_probe_sizes.len()
            })
        }

        for (index, value) in params.initial_probe_sizes.iter().enumerate() {
            if !value.is_finite() || *value < 0.0 {
                return Err(TwiddleError::InvalidProbeSize { index, value: *value })
            }
        }

        if !params.tolerance.is_finite() || params.tolerance <= 0.0 {
            return Err(TwiddleError::InvalidTolerance(params.tolerance))
        }

        if !params.growth_factor.is_finite() || params.growth_factor <= 1.0 {
            return Err(TwiddleError::InvalidGrowthFactor(params.growth_factor))
        }

        if !(params.decay_factor > 0.0 && params.decay_factor < 1.0) {
            return Err(TwiddleError::InvalidDecayFactor(params.decay_factor))
        }

        let mut probe_sizes = [0f64; N];
        probe_sizes.copy_from_slice(&params.initial_probe_sizes);

        Ok(Self {
            tolerance: params.tolerance,
            growth_factor: params.growth_factor,
            decay_factor: params.decay_factor,
            probe_sizes,
            state: TwiddleState::ProbeUp,
            cursor: 0,
            best_score: None,
            best_params: [0f64; N]
        })
    }

    /// Run the optimiser once with the score of the last evaluation of
    /// `params`. Lower scores are better.
    ///
    /// When `false` is returned `params` holds the next parameters to
    /// evaluate. When `true` is returned the search is complete and `params`
    /// holds the best parameters found, the caller should stop calling
    /// `step`.
    pub fn step(&mut self, score: f64, params: &mut [f64; N]) -> bool {
        // The first evaluation is the baseline
        if self.best_score.is_none() {
            self.best_score = Some(score);
            self.best_params = *params;
        }

        trace!(
            "Twiddle step in {:?} on parameter {} with score {}",
            self.state, self.cursor, score
        );

        match self.state {
            TwiddleState::ProbeUp => self.probe_up(params),

            TwiddleState::ProbeDown => {
                if self.is_improvement(score) {
                    self.accept(score, params);
                    return false
                }

                // Try the other side of the baseline
                params[self.cursor] -= 2.0 * self.probe_sizes[self.cursor];
                self.state = TwiddleState::Conclude;
                false
            },

            TwiddleState::Conclude => {
                if self.is_improvement(score) {
                    self.accept(score, params);
                    return false
                }

                // Neither direction helped, go back to the baseline with a
                // smaller probe
                params[self.cursor] += self.probe_sizes[self.cursor];
                self.probe_sizes[self.cursor] *= self.decay_factor;
                self.advance();

                // Probe the next parameter now so the caller always gets a
                // new set of parameters to evaluate
                self.state = TwiddleState::ProbeUp;
                self.probe_up(params)
            }
        }
    }

    /// Current state machine position.
    pub fn state(&self) -> TwiddleState {
        self.state
    }

    /// Index of the parameter currently being probed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn probe_sizes(&self) -> &[f64; N] {
        &self.probe_sizes
    }

    /// Sum of the probe sizes, compared against the tolerance.
    pub fn probe_sum(&self) -> f64 {
        maths::sum(&self.probe_sizes)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// The best parameters found, or `None` before the first step.
    pub fn best_params(&self) -> Option<&[f64; N]> {
        self.best_score.map(|_| &self.best_params)
    }

    fn probe_up(&mut self, params: &mut [f64; N]) -> bool {
        if self.probe_sum() < self.tolerance {
            *params = self.best_params;
            return true
        }

        params[self.cursor] += self.probe_sizes[self.cursor];
        self.state = TwiddleState::ProbeDown;
        false
    }

    fn is_improvement(&self, score: f64) -> bool {
        match self.best_score {
            Some(best) => score < best,
            None => false
        }
    }

    /// Keep the current parameters as the new best and grow the probe.
    fn accept(&mut self, score: f64, params: &[f64; N]) {
        self.best_score = Some(score);
        self.best_params = *params;
        self.probe_sizes[self.cursor] *= self.growth_factor;
        self.advance();
        self.state = TwiddleState::ProbeUp;
    }

    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= N {
            self.cursor = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params(probe: f64, tolerance: f64) -> Params {
        Params {
            initial_probe_sizes: vec![probe; 3],
            tolerance,
            growth_factor: 1.25,
            decay_factor: 0.75
        }
    }

    #[test]
    fn test_first_step() -> Result<(), TwiddleError> {
        let mut twiddle: Twiddle<3> = Twiddle::new(&params(1.0, 0.01))?;
        let mut gains = [1.0, 0.0, 0.0];

        assert_eq!(twiddle.step(5.0, &mut gains), false);

        assert_eq!(gains, [2.0, 0.0, 0.0]);
        assert_eq!(twiddle.best_score(), Some(5.0));
        assert_eq!(twiddle.best_params(), Some(&[1.0, 0.0, 0.0]));
        assert_eq!(twiddle.state(), TwiddleState::ProbeDown);

        Ok(())
    }

    #[test]
    fn test_state_machine_sequence() -> Result<(), TwiddleError> {
        let mut twiddle: Twiddle<3> = Twiddle::new(&params(1.0, 0.01))?;
        let mut gains = [1.0, 0.0, 0.0];

        // Baseline, probe k_p up
        assert!(!twiddle.step(5.0, &mut gains));
        assert_eq!(gains, [2.0, 0.0, 0.0]);

        // Better, keep it, grow the probe and move on without perturbing
        assert!(!twiddle.step(4.0, &mut gains));
        assert_eq!(gains, [2.0, 0.0, 0.0]);
        assert_eq!(twiddle.probe_sizes(), &[1.25, 1.0, 1.0]);
        assert_eq!(twiddle.cursor(), 1);
        assert_eq!(twiddle.state(), TwiddleState::ProbeUp);

        // Probe k_i up
        assert!(!twiddle.step(4.0, &mut gains));
        assert_eq!(gains, [2.0, 1.0, 0.0]);

        // Worse, try below the baseline
        assert!(!twiddle.step(10.0, &mut gains));
        assert_eq!(gains, [2.0, -1.0, 0.0]);
        assert_eq!(twiddle.state(), TwiddleState::Conclude);
        assert_eq!(twiddle.probe_sizes(), &[1.25, 1.0, 1.0]);

        // Worse again, restore k_i, shrink its probe and probe k_d up
        assert!(!twiddle.step(10.0, &mut gains));
        assert_eq!(gains, [2.0, 0.0, 1.0]);
        assert_eq!(twiddle.probe_sizes(), &[1.25, 0.75, 1.0]);
        assert_eq!(twiddle.cursor(), 2);
        assert_eq!(twiddle.state(), TwiddleState::ProbeDown);

        // Worse, then better on the way down
        assert!(!twiddle.step(10.0, &mut gains));
        assert_eq!(gains, [2.0, 0.0, -1.0]);
        assert!(!twiddle.step(3.0, &mut gains));
        assert_eq!(twiddle.best_params(), Some(&[2.0, 0.0, -1.0]));
        assert_eq!(twiddle.probe_sizes(), &[1.25, 0.75, 1.25]);
        assert_eq!(twiddle.cursor(), 0);

        Ok(())
    }

    #[test]
    fn test_terminates_on_constant_failure() -> Result<(), TwiddleError> {
        let mut twiddle: Twiddle<3> = Twiddle::new(&params(1.0, 0.01))?;
        let initial = [0.2, 0.004, 3.0];
        let mut gains = initial;

        // Baseline
        assert!(!twiddle.step(1.0, &mut gains));

        let mut prev_probes = *twiddle.probe_sizes();
        let mut done = false;

        for _ in 0..10_000 {
            done = twiddle.step(2.0, &mut gains);

            // Failures never grow a probe
            for (p, prev) in twiddle.probe_sizes().iter().zip(prev_probes.iter()) {
                assert!(p <= prev);
            }
            prev_probes = *twiddle.probe_sizes();

            if done {
                break
            }
        }

        assert!(done);
        assert!(twiddle.probe_sum() < twiddle.tolerance());
        assert_eq!(gains, initial);
        assert_eq!(twiddle.best_params(), Some(&initial));

        // Further calls keep reporting completion with the best parameters
        let mut again = [9.0, 9.0, 9.0];
        assert!(twiddle.step(2.0, &mut again));
        assert_eq!(again, initial);

        Ok(())
    }

    #[test]
    fn test_converges_on_accepted_improvement() -> Result<(), TwiddleError> {
        let mut twiddle: Twiddle<3> = Twiddle::new(&params(1.0, 0.01))?;
        let mut gains = [1.0, 0.0, 0.0];

        // Baseline then an improvement on k_p
        assert!(!twiddle.step(5.0, &mut gains));
        assert!(!twiddle.step(4.0, &mut gains));
        assert_eq!(twiddle.best_params(), Some(&[2.0, 0.0, 0.0]));

        // Nothing else helps
        let mut done = false;
        for _ in 0..10_000 {
            done = twiddle.step(10.0, &mut gains);
            if done {
                break
            }
        }

        assert!(done);
        assert_eq!(gains, [2.0, 0.0, 0.0]);
        assert_eq!(twiddle.best_params(), Some(&[2.0, 0.0, 0.0]));
        assert_eq!(twiddle.best_score(), Some(4.0));

        Ok(())
    }

    #[test]
    fn test_done_only_below_tolerance() -> Result<(), TwiddleError> {
        let mut twiddle: Twiddle<3> = Twiddle::new(&params(0.1, 0.24))?;
        let mut gains = [0.0, 0.0, 0.0];

        // Probe sum 0.3 is above tolerance
        assert!(!twiddle.step(1.0, &mut gains));

        // Fail both directions of k_p, probe sum becomes 0.275
        assert!(!twiddle.step(2.0, &mut gains));
        assert!(!twiddle.step(2.0, &mut gains));
        assert!(twiddle.probe_sum() >= 0.24);

        // Fail both directions of k_i, sum drops to 0.25
        assert!(!twiddle.step(2.0, &mut gains));
        assert!(!twiddle.step(2.0, &mut gains));
        assert!(twiddle.probe_sum() >= 0.24);

        // Fail both directions of k_d, sum drops below the tolerance and the
        // search completes in the same call
        assert!(!twiddle.step(2.0, &mut gains));
        assert!(twiddle.step(2.0, &mut gains));
        assert_eq!(gains, [0.0, 0.0, 0.0]);

        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params(1.0, 0.0);
        assert!(matches!(Twiddle::<3>::new(&p), Err(TwiddleError::InvalidTolerance(_))));

        p.tolerance = -1.0;
        assert!(matches!(Twiddle::<3>::new(&p), Err(TwiddleError::InvalidTolerance(_))));

        p = params(1.0, 0.1);
        assert!(matches!(Twiddle::<0>::new(&p), Err(TwiddleError::NoParameters)));
        assert!(matches!(
            Twiddle::<2>::new(&p),
            Err(TwiddleError::ProbeSizeCount { expected: 2, found: 3 })
        ));

        p.initial_probe_sizes[1] = -0.1;
        assert!(matches!(
            Twiddle::<3>::new(&p),
            Err(TwiddleError::InvalidProbeSize { index: 1, .. })
        ));

        p = params(1.0, 0.1);
        p.growth_factor = 1.0;
        assert!(matches!(Twiddle::<3>::new(&p), Err(TwiddleError::InvalidGrowthFactor(_))));

        p = params(1.0, 0.1);
        p.decay_factor = 1.0;
        assert!(matches!(Twiddle::<3>::new(&p), Err(TwiddleError::InvalidDecayFactor(_))));
    }
}
