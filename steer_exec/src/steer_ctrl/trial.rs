//! Trial evidence collection and scoring

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::TrialParams;
use util::maths;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Added to the mean speed when scoring so a stationary vehicle can't divide
/// by zero.
pub const SPEED_EPSILON: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One measurement collected for a trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cte: f64,
    pub speed: f64
}

/// Evidence buffer and episode counters for the current trial.
#[derive(Debug, Default, Clone)]
pub struct TrialWindow {
    params: TrialParams,

    /// Collected samples, never more than `params.window_ticks`
    samples: Vec<Sample>,

    /// Ticks since the start of the episode
    tick: u64,

    /// Current length of the ignore window, grows with widening
    ignore_ticks: u64,

    /// Number of trials scored so far
    episodes_scored: u64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reason a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrialEnd {
    /// The window collected all of its samples.
    WindowFull,

    /// The vehicle drifted too far from the path.
    CteLimit,

    /// The vehicle was too slow.
    SpeedLimit,

    /// The episode ran for too many ticks.
    TickLimit
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrialWindow {
    pub fn new(params: TrialParams) -> Self {
        Self {
            ignore_ticks: params.ignore_ticks,
            samples: Vec::with_capacity(params.window_ticks),
            tick: 0,
            episodes_scored: 0,
            params
        }
    }

    /// Advance the episode by one tick with the given measurement.
    ///
    /// Returns the reason the trial ended if it should be finalised on this
    /// tick, otherwise `None`.
    pub fn push(&mut self, sample: Sample) -> Option<TrialEnd> {
        self.tick += 1;

        if self.tick > self.params.grace_ticks {
            if let Some(end) = self.check_envelope(&sample) {
                return Some(end)
            }
        }

        if self.in_ignore_window() {
            return None
        }

        self.samples.push(sample);

        if self.samples.len() >= self.params.window_ticks {
            Some(TrialEnd::WindowFull)
        }
        else {
            None
        }
    }

    /// Score the trial, lower is better.
    ///
    /// Trials cut short by an early termination get the worst possible score.
    pub fn score(&self, end: TrialEnd) -> f64 {
        if end != TrialEnd::WindowFull {
            return f64::MAX
        }

        let cte: Vec<f64> = self.samples.iter().map(|s| s.cte).collect();
        let speed: Vec<f64> = self.samples.iter().map(|s| s.speed).collect();

        match (maths::mean_abs(&cte), maths::mean(&speed)) {
            (Some(c), Some(s)) => c / (s + SPEED_EPSILON),
            _ => f64::MAX
        }
    }

    /// Start a new episode after scoring the current one.
    ///
    /// Returns the new ignore window length if it was widened.
    pub fn finish_episode(&mut self) -> Option<u64> {
        self.restart();
        self.episodes_scored += 1;

        let every = self.params.widen_every_n_episodes;

        if every > 0
            && self.params.widen_by_ticks > 0
            && self.episodes_scored % every == 0
        {
            self.ignore_ticks += self.params.widen_by_ticks;
            Some(self.ignore_ticks)
        }
        else {
            None
        }
    }

    /// Discard the current episode without scoring it.
    pub fn restart(&mut self) {
        self.samples.clear();
        self.tick = 0;
    }

    pub fn in_ignore_window(&self) -> bool {
        self.tick <= self.ignore_ticks
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ignore_ticks(&self) -> u64 {
        self.ignore_ticks
    }

    pub fn episodes_scored(&self) -> u64 {
        self.episodes_scored
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn check_envelope(&self, sample: &Sample) -> Option<TrialEnd> {
        if sample.cte.abs() > self.params.max_abs_cte {
            Some(TrialEnd::CteLimit)
        }
        else if sample.speed < self.params.min_speed {
            Some(TrialEnd::SpeedLimit)
        }
        else {
            match self.params.max_episode_ticks {
                Some(max) if self.tick > max => Some(TrialEnd::TickLimit),
                _ => None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
