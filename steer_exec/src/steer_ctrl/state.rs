//! Implementations for the SteerCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::{Params, Sample, SteerCtrlError, TrialEnd, TrialWindow};
use crate::{
    pid_ctrl::{Gains, PidController, NUM_GAINS},
    twiddle::Twiddle
};
use comms_if::sim::Telemetry;
use util::{
    params,
    module::State,
    archive::{Archived, Archiver, ArchiveError},
    session::Session
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Steering control module state
#[derive(Default)]
pub struct SteerCtrl {
    pub(crate) params: Params,

    pid: PidController,

    /// Gain search, `None` if tuning is disabled
    twiddle: Option<Twiddle<NUM_GAINS>>,

    tuning: TuningStatus,

    window: TrialWindow,

    initialised: bool,

    /// Last finalised trial, waiting to be archived
    last_trial: Option<TrialReport>,
    arch_trials: Archiver
}

/// Input data to steering control, one telemetry sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Cross track error
    pub cte: f64,

    /// Vehicle speed
    pub speed: f64
}

/// Commands for the simulator.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Steering correction between -1 and +1.
    pub steering_angle: f64,

    /// Throttle demand.
    pub throttle: f64,

    /// If true the simulator must be reset before the steering command is
    /// sent.
    pub reset: bool
}

/// Status report for SteerCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Tick within the current episode
    pub tick: u64,

    /// Number of trials scored so far
    pub episode: u64,

    pub tuning: TuningStatus,

    /// The trial finalised on this cycle, if any
    pub trial: Option<TrialReport>
}

/// Summary of a finalised trial, one row in the trial archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialReport {
    pub episode: u64,
    pub reason: TrialEnd,
    pub score: f64,

    pub tried_k_p: f64,
    pub tried_k_i: f64,
    pub tried_k_d: f64,

    pub next_k_p: f64,
    pub next_k_i: f64,
    pub next_k_d: f64,

    pub probe_k_p: f64,
    pub probe_k_i: f64,
    pub probe_k_d: f64,

    pub done: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Whether the gains are still being tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TuningStatus {
    /// The controller drives with fixed gains.
    Disabled,

    /// Trials are being run.
    Active,

    /// The search has finished, the best gains are frozen.
    Converged
}

impl Default for TuningStatus {
    fn default() -> Self {
        TuningStatus::Disabled
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteerCtrl {
    /// Create a new steering controller from the parameters.
    ///
    /// Trials are not archived by a controller created this way, use `init`
    /// to archive into a session.
    pub fn new(params: Params) -> Result<Self, SteerCtrlError> {
        params.trial.validate()?;

        let (twiddle, tuning) = if params.tuning_enabled {
            (
                Some(Twiddle::new(&params.twiddle).map_err(SteerCtrlError::Twiddle)?),
                TuningStatus::Active
            )
        }
        else {
            (None, TuningStatus::Disabled)
        };

        Ok(Self {
            pid: PidController::new(params.initial_gains),
            twiddle,
            tuning,
            window: TrialWindow::new(params.trial.clone()),
            initialised: true,
            last_trial: None,
            arch_trials: Archiver::default(),
            params
        })
    }

    /// Stop tuning, the current gains are kept.
    pub fn disable_tuning(&mut self) {
        if self.tuning == TuningStatus::Active {
            info!("Tuning disabled, driving with {}", self.gains());
        }

        self.twiddle = None;
        self.tuning = TuningStatus::Disabled;
        self.window.restart();
    }

    /// Abandon the current episode without scoring it.
    ///
    /// Used when the simulator disconnects mid-trial.
    pub fn restart_episode(&mut self) {
        if self.tuning == TuningStatus::Active {
            info!(
                "Episode {} abandoned after {} ticks",
                self.window.episodes_scored(),
                self.window.tick()
            );
        }

        self.window.restart();
    }

    /// Gains currently used by the controller.
    pub fn gains(&self) -> Gains {
        self.pid.gains()
    }

    pub fn tuning(&self) -> TuningStatus {
        self.tuning
    }

    pub fn window(&self) -> &TrialWindow {
        &self.window
    }

    pub fn twiddle(&self) -> Option<&Twiddle<NUM_GAINS>> {
        self.twiddle.as_ref()
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Score the trial, step the search and apply the result.
    fn finalise_trial(&mut self, end: TrialEnd) -> Option<TrialReport> {
        let twiddle = self.twiddle.as_mut()?;

        let score = self.window.score(end);
        let tried = self.pid.gains();
        let episode = self.window.episodes_scored();

        info!("Episode {} ended ({:?}) with score {:e}", episode, end, score);

        let mut next = tried.to_array();
        let done = twiddle.step(score, &mut next);
        let next = Gains::from(next);

        if next == tried {
            info!("Kept {}", next);
        }
        else {
            info!("Trying new gains {}", next);
        }

        let probes = *twiddle.probe_sizes();
        info!(
            "Probe sizes: k_p = {}, k_i = {}, k_d = {} (sum {})",
            probes[0], probes[1], probes[2], twiddle.probe_sum()
        );

        self.pid.reconfigure(next);

        if let Some(ignore) = self.window.finish_episode() {
            info!("Ignore window widened to {} ticks", ignore);
        }

        if done {
            info!("Tuning converged, final gains: {}", next);
            self.twiddle = None;
            self.tuning = TuningStatus::Converged;
        }

        Some(TrialReport {
            episode,
            reason: end,
            score,
            tried_k_p: tried.k_p,
            tried_k_i: tried.k_i,
            tried_k_d: tried.k_d,
            next_k_p: next.k_p,
            next_k_i: next.k_i,
            next_k_d: next.k_d,
            probe_k_p: probes[0],
            probe_k_i: probes[1],
            probe_k_d: probes[2],
            done
        })
    }
}

impl State for SteerCtrl {
    type InitData = String;
    type InitError = SteerCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SteerCtrlError;

    /// Initialise the SteerCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        let params: Params = params::load(&init_data)
            .map_err(SteerCtrlError::ParamLoadError)?;

        *self = Self::new(params)?;

        self.arch_trials = Archiver::from_path(session, "steer_ctrl/trials.csv")
            .map_err(SteerCtrlError::ArchiveError)?;

        info!("Initial gains: {}", self.gains());

        Ok(())
    }

    /// Process one telemetry sample.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        if !self.initialised {
            return Err(SteerCtrlError::NotInitialised)
        }

        if !input_data.cte.is_finite() || !input_data.speed.is_finite() {
            return Err(SteerCtrlError::InvalidInput {
                cte: input_data.cte,
                speed: input_data.speed
            })
        }

        let mut reset = false;

        if self.tuning == TuningStatus::Active {
            let sample = Sample {
                cte: input_data.cte,
                speed: input_data.speed
            };

            if let Some(end) = self.window.push(sample) {
                self.last_trial = self.finalise_trial(end);
                reset = true;
            }
        }

        let trial = self.last_trial;

        if trial.is_some() {
            if let Err(e) = self.write() {
                warn!("Could not archive the trial: {}", e);
            }
        }

        // Always steer with the latest gains
        let steering_angle = self.pid.compute(input_data.cte);

        debug!(
            "CTE: {:.4} Speed: {:.2} Steering: {:.4}",
            input_data.cte, input_data.speed, steering_angle
        );

        let output = OutputData {
            steering_angle,
            throttle: self.params.throttle,
            reset
        };

        let report = StatusReport {
            tick: self.window.tick(),
            episode: self.window.episodes_scored(),
            tuning: self.tuning,
            trial
        };

        Ok((output, report))
    }
}

impl Archived for SteerCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if let Some(trial) = self.last_trial.take() {
            self.arch_trials.serialise(trial)?;
        }

        Ok(())
    }
}

impl From<Telemetry> for InputData {
    fn from(t: Telemetry) -> Self {
        Self {
            cte: t.cte,
            speed: t.speed
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{steer_ctrl::TrialParams, twiddle};

    fn params() -> Params {
        Params {
            throttle: 0.3,
            tuning_enabled: true,
            initial_gains: Gains::new(1.0, 0.0, 0.0),
            twiddle: twiddle::Params {
                initial_probe_sizes: vec![1.0, 1.0, 1.0],
                tolerance: 0.01,
                growth_factor: 1.25,
                decay_factor: 0.75
            },
            trial: TrialParams {
                grace_ticks: 10,
                ignore_ticks: 25,
                window_ticks: 100,
                max_abs_cte: 4.0,
                min_speed: 5.0,
                max_episode_ticks: None,
                widen_every_n_episodes: 0,
                widen_by_ticks: 0
            }
        }
    }

    const GOOD: InputData = InputData { cte: 0.1, speed: 10.0 };

    #[test]
    fn test_full_window_scenario() -> Result<(), SteerCtrlError> {
        let mut ctrl = SteerCtrl::new(params())?;

        for _ in 1..125 {
            let (out, report) = ctrl.proc(&GOOD)?;
            assert!(!out.reset);
            assert!(report.trial.is_none());
            assert_eq!(out.throttle, 0.3);
        }

        // Tick 125 finalises
        let (out, report) = ctrl.proc(&GOOD)?;
        assert!(out.reset);
        assert_eq!(report.tick, 0);
        assert_eq!(report.episode, 1);

        let trial = report.trial.ok_or(SteerCtrlError::NotInitialised)?;
        assert_eq!(trial.reason, TrialEnd::WindowFull);
        assert_eq!((trial.tried_k_p, trial.next_k_p), (1.0, 2.0));
        assert!(!trial.done);

        // New gains are already in use on the finalising tick
        assert_eq!(ctrl.gains(), Gains::new(2.0, 0.0, 0.0));

        // Tick 126 starts a fresh window
        let (out, report) = ctrl.proc(&GOOD)?;
        assert!(!out.reset);
        assert_eq!(report.tick, 1);
        assert!(report.trial.is_none());
        assert_eq!(ctrl.window().num_samples(), 0);

        Ok(())
    }

    #[test]
    fn test_early_termination_on_speed() -> Result<(), SteerCtrlError> {
        let mut ctrl = SteerCtrl::new(params())?;

        for _ in 0..40 {
            let (out, _) = ctrl.proc(&GOOD)?;
            assert!(!out.reset);
        }

        let (out, report) = ctrl.proc(&InputData { cte: 0.1, speed: 1.0 })?;
        assert!(out.reset);

        let trial = report.trial.ok_or(SteerCtrlError::NotInitialised)?;
        assert_eq!(trial.reason, TrialEnd::SpeedLimit);
        assert_eq!(trial.score, f64::MAX);
        assert_eq!(ctrl.window().tick(), 0);

        Ok(())
    }

    #[test]
    fn test_tuning_disabled() -> Result<(), SteerCtrlError> {
        let mut p = params();
        p.tuning_enabled = false;
        p.twiddle.tolerance = -1.0;

        // Twiddle parameters are not checked when not tuning
        let mut ctrl = SteerCtrl::new(p)?;
        assert_eq!(ctrl.tuning(), TuningStatus::Disabled);

        for _ in 0..500 {
            let (out, report) = ctrl.proc(&GOOD)?;
            assert!(!out.reset);
            assert!(report.trial.is_none());
        }

        assert_eq!(ctrl.gains(), Gains::new(1.0, 0.0, 0.0));

        Ok(())
    }

    #[test]
    fn test_converged_gains_are_frozen() -> Result<(), SteerCtrlError> {
        let mut p = params();
        p.twiddle.initial_probe_sizes = vec![0.001, 0.001, 0.001];
        p.trial.window_ticks = 1;
        p.trial.ignore_ticks = 0;

        let mut ctrl = SteerCtrl::new(p)?;

        // First trial records the baseline, the probe sum is already below
        // the tolerance so the search completes immediately
        let (out, report) = ctrl.proc(&GOOD)?;
        assert!(out.reset);
        assert_eq!(report.tuning, TuningStatus::Converged);
        assert!(report.trial.map(|t| t.done).unwrap_or(false));
        assert_eq!(ctrl.gains(), Gains::new(1.0, 0.0, 0.0));

        for _ in 0..10 {
            let (out, report) = ctrl.proc(&GOOD)?;
            assert!(!out.reset);
            assert!(report.trial.is_none());
        }

        Ok(())
    }

    #[test]
    fn test_restart_episode() -> Result<(), SteerCtrlError> {
        let mut ctrl = SteerCtrl::new(params())?;

        for _ in 0..60 {
            ctrl.proc(&GOOD)?;
        }
        assert_eq!(ctrl.window().num_samples(), 35);

        ctrl.restart_episode();

        assert_eq!(ctrl.window().tick(), 0);
        assert_eq!(ctrl.window().num_samples(), 0);
        assert_eq!(ctrl.window().episodes_scored(), 0);
        assert_eq!(ctrl.gains(), Gains::new(1.0, 0.0, 0.0));

        Ok(())
    }

    #[test]
    fn test_trials_archived() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let session = Session {
            session_root: dir.path().to_path_buf(),
            arch_root: dir.path().join("arch"),
            log_file_path: dir.path().join("steer_exec.log")
        };

        let mut p = params();
        p.trial.ignore_ticks = 0;
        p.trial.window_ticks = 5;

        let mut ctrl = SteerCtrl::new(p)?;
        ctrl.arch_trials = Archiver::from_path(&session, "steer_ctrl/trials.csv")?;

        for _ in 0..10 {
            ctrl.proc(&GOOD)?;
        }

        let csv = std::fs::read_to_string(session.arch_root.join("steer_ctrl/trials.csv"))?;
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("episode,reason,score,tried_k_p"));
        assert!(lines[1].starts_with("0,WindowFull,"));
        assert!(lines[2].starts_with("1,WindowFull,"));

        Ok(())
    }

    #[test]
    fn test_invalid_input_and_config() {
        let mut ctrl = SteerCtrl::default();
        assert!(matches!(ctrl.proc(&GOOD), Err(SteerCtrlError::NotInitialised)));

        let mut p = params();
        p.twiddle.initial_probe_sizes = vec![1.0, -1.0, 1.0];
        assert!(matches!(SteerCtrl::new(p), Err(SteerCtrlError::Twiddle(_))));

        let mut p = params();
        p.trial.window_ticks = 0;
        assert!(matches!(SteerCtrl::new(p), Err(SteerCtrlError::InvalidTrialParams(_))));

        if let Ok(mut ctrl) = SteerCtrl::new(params()) {
            let nan = InputData { cte: f64::NAN, speed: 10.0 };
            assert!(matches!(ctrl.proc(&nan), Err(SteerCtrlError::InvalidInput { .. })));
            assert_eq!(ctrl.window().tick(), 0);
        }
    }
}
