//! Timed animation runs
//!
//! A run owns all of its mutable state. Frame callbacks and input handlers
//! reach it through the owning loop, never through globals. Once a run stops
//! (completion, reaction or cancel) every further frame returns
//! `Flow::Stop` without touching state.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::judge::{ReactionJudge, ReactionOutcome, ReactionWindow};
use super::motion::{BrakingPath, HillClimb, HillConfig, MotionProfile, ProgressCurve};
use crate::consts::*;
use crate::error::{ConfigError, PresentError};
use crate::present::{HillSnapshot, Presenter, ReactionSnapshot};
use crate::scheduler::Flow;

/// Reaction demo parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionConfig {
    pub total_duration_ms: f64,
    pub distance: f64,
    #[serde(flatten)]
    pub window: ReactionWindow,
    /// Fraction of the run after which the pedestrian is struck
    pub impact_fraction: f64,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            total_duration_ms: REACTION_TOTAL_MS,
            distance: REACTION_DISTANCE,
            window: ReactionWindow::default(),
            impact_fraction: IMPACT_FRACTION,
        }
    }
}

impl ReactionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("reaction.total_duration_ms", self.total_duration_ms)?;
        ConfigError::require_positive("reaction.distance", self.distance)?;
        self.window.validate()?;
        if !(0.0..=1.0).contains(&self.impact_fraction) {
            return Err(ConfigError::OutOfRange {
                field: "reaction.impact_fraction",
                value: self.impact_fraction,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Per-run mutable state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunState {
    /// Timestamp of the first frame; `None` until the run is armed
    pub start_timestamp: Option<f64>,
    pub elapsed_ms: f64,
    pub current_position: f64,
    pub running: bool,
    pub reacted: bool,
    pub impact: bool,
}

/// Reaction-time car animation with its judge
#[derive(Debug, Clone)]
pub struct ReactionRun {
    config: ReactionConfig,
    path: BrakingPath,
    judge: Option<ReactionJudge>,
    state: RunState,
    runs_started: u32,
}

impl ReactionRun {
    pub fn new(config: ReactionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = MotionProfile::new(config.total_duration_ms, config.distance)?;
        Ok(Self {
            config,
            path: BrakingPath::braking(profile),
            judge: None,
            state: RunState::default(),
            runs_started: 0,
        })
    }

    /// Reset and begin a run; the judge arms on the next frame
    pub fn start(&mut self) {
        self.state = RunState {
            running: true,
            ..RunState::default()
        };
        self.judge = None;
        self.runs_started += 1;
        info!(
            "Reaction run {} started (a = {:.1} px/s²)",
            self.runs_started,
            self.path.curve.acceleration()
        );
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn outcome(&self) -> Option<ReactionOutcome> {
        self.judge.as_ref().and_then(ReactionJudge::outcome)
    }

    /// Stop without an outcome; later frames and reactions are no-ops
    pub fn cancel(&mut self) {
        if self.state.running {
            debug!("Reaction run cancelled");
        }
        self.state.running = false;
    }

    /// Advance to `timestamp` and present the result
    pub fn frame<P>(&mut self, timestamp: f64, view: &mut P) -> Result<Flow, PresentError>
    where
        P: Presenter<ReactionSnapshot> + ?Sized,
    {
        if !self.state.running {
            return Ok(Flow::Stop);
        }

        let start = *self.state.start_timestamp.get_or_insert(timestamp);
        let total = self.config.total_duration_ms;
        let window = self.config.window;
        let judge = self
            .judge
            .get_or_insert_with(|| ReactionJudge::arm(window, total, start));

        let elapsed = timestamp - start;
        self.state.elapsed_ms = elapsed;
        self.state.current_position = self.path.position_at(elapsed).x;

        let impact_started = !self.state.impact && elapsed >= total * self.config.impact_fraction;
        if impact_started {
            self.state.impact = true;
            debug!("Impact at {:.0} ms", elapsed);
        }

        let decided = judge.poll(timestamp);
        if decided.is_some() {
            self.state.running = false;
            info!("Reaction run ended without a reaction");
        }

        view.present(&self.snapshot(impact_started, decided.is_some()))?;

        Ok(if self.state.running {
            Flow::Continue
        } else {
            Flow::Stop
        })
    }

    /// Handle a react signal at host time `now`.
    ///
    /// Returns the outcome when this signal decided it; any other signal is
    /// dropped without side effects.
    pub fn react<P>(
        &mut self,
        now: f64,
        view: &mut P,
    ) -> Result<Option<ReactionOutcome>, PresentError>
    where
        P: Presenter<ReactionSnapshot> + ?Sized,
    {
        if !self.state.running {
            return Ok(None);
        }
        let Some(outcome) = self.judge.as_mut().and_then(|judge| judge.react(now)) else {
            return Ok(None);
        };

        self.state.running = false;
        self.state.reacted = !matches!(outcome, ReactionOutcome::Missed { .. });
        info!(
            "Reaction after {:.0} ms: {:?}",
            outcome.elapsed_ms(),
            outcome
        );

        view.present(&self.snapshot(false, true))?;
        Ok(Some(outcome))
    }

    pub fn snapshot(&self, impact_started: bool, decided: bool) -> ReactionSnapshot {
        ReactionSnapshot {
            elapsed_ms: self.state.elapsed_ms,
            position: self.state.current_position,
            running: self.state.running,
            impact: self.state.impact,
            impact_started,
            outcome: self.outcome(),
            decided,
        }
    }
}

/// Hill-climb animation for one selected speed
#[derive(Debug, Clone)]
pub struct HillRun {
    config: HillConfig,
    climb: Option<HillClimb>,
    selected_speed: f64,
    start_timestamp: Option<f64>,
    elapsed_ms: f64,
    running: bool,
}

impl HillRun {
    pub fn new(config: HillConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            climb: None,
            selected_speed: config.min_speed,
            start_timestamp: None,
            elapsed_ms: 0.0,
            running: false,
        })
    }

    /// Begin a climb at `selected_speed`
    pub fn start(&mut self, selected_speed: f64) -> Result<(), ConfigError> {
        let climb = HillClimb::climb(&self.config, selected_speed)?;
        info!(
            "Hill climb at speed {:.0} ({:.0} ms)",
            selected_speed,
            climb.duration_ms()
        );
        self.climb = Some(climb);
        self.selected_speed = selected_speed;
        self.start_timestamp = None;
        self.elapsed_ms = 0.0;
        self.running = true;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn frame<P>(&mut self, timestamp: f64, view: &mut P) -> Result<Flow, PresentError>
    where
        P: Presenter<HillSnapshot> + ?Sized,
    {
        if !self.running {
            return Ok(Flow::Stop);
        }
        let Some(climb) = self.climb else {
            self.running = false;
            return Ok(Flow::Stop);
        };

        let start = *self.start_timestamp.get_or_insert(timestamp);
        self.elapsed_ms = timestamp - start;
        if climb.is_complete(self.elapsed_ms) {
            self.running = false;
        }

        let snapshot = HillSnapshot {
            elapsed_ms: self.elapsed_ms,
            selected_speed: self.selected_speed,
            progress: climb.curve.progress(self.elapsed_ms),
            position: climb.position_at(self.elapsed_ms),
            finished: !self.running,
        };
        view.present(&snapshot)?;

        Ok(if self.running {
            Flow::Continue
        } else {
            Flow::Stop
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::NullPresenter;

    fn run() -> ReactionRun {
        let mut run = ReactionRun::new(ReactionConfig::default()).unwrap();
        run.start();
        run
    }

    #[test]
    fn test_frames_advance_position() {
        let mut run = run();
        let mut view = NullPresenter;
        assert_eq!(run.frame(1000.0, &mut view), Ok(Flow::Continue));
        assert_eq!(run.state().current_position, 0.0);
        assert_eq!(run.state().start_timestamp, Some(1000.0));

        run.frame(1560.0, &mut view).unwrap();
        assert!((run.state().current_position - 640.0).abs() < 1e-6);
    }

    #[test]
    fn test_run_expires_as_missed() {
        let mut run = run();
        let mut reports = Vec::new();
        let mut view = |s: &ReactionSnapshot| {
            reports.push(*s);
            Ok::<(), PresentError>(())
        };

        let mut ts = 0.0;
        while run.frame(ts, &mut view).unwrap() == Flow::Continue {
            ts += 16.0;
        }
        // Later frames do nothing
        assert_eq!(run.frame(ts + 16.0, &mut view), Ok(Flow::Stop));

        let decided: Vec<_> = reports.iter().filter(|s| s.decided).collect();
        assert_eq!(decided.len(), 1);
        assert_eq!(
            decided[0].outcome,
            Some(ReactionOutcome::Missed { elapsed_ms: 700.0 })
        );
        assert_eq!(decided[0].position, 1000.0);
        assert_eq!(reports.iter().filter(|s| s.impact_started).count(), 1);
    }

    #[test]
    fn test_react_stops_run() {
        let mut run = run();
        let mut view = NullPresenter;
        run.frame(0.0, &mut view).unwrap();
        run.frame(640.0, &mut view).unwrap();

        let outcome = run.react(650.0, &mut view).unwrap();
        assert_eq!(outcome, Some(ReactionOutcome::OnTime { elapsed_ms: 650.0 }));
        assert!(run.state().reacted);
        assert!(!run.is_running());

        // Frame after the reaction leaves state untouched
        let before = *run.state();
        assert_eq!(run.frame(656.0, &mut view), Ok(Flow::Stop));
        assert_eq!(*run.state(), before);
    }

    #[test]
    fn test_second_react_ignored() {
        let mut run = run();
        let mut view = NullPresenter;
        run.frame(0.0, &mut view).unwrap();
        run.react(400.0, &mut view).unwrap();
        assert_eq!(run.react(500.0, &mut view), Ok(None));
        assert_eq!(
            run.outcome(),
            Some(ReactionOutcome::TooFast { elapsed_ms: 400.0 })
        );
    }

    #[test]
    fn test_react_before_first_frame_ignored() {
        let mut run = run();
        let mut view = NullPresenter;
        assert_eq!(run.react(10.0, &mut view), Ok(None));
        assert!(run.is_running());
    }

    #[test]
    fn test_present_error_keeps_state_consistent() {
        let mut run = run();
        let mut failing = |_: &ReactionSnapshot| Err::<(), _>(PresentError::Failed("boom".into()));
        assert!(run.frame(0.0, &mut failing).is_err());
        assert!(run.frame(100.0, &mut failing).is_err());
        assert_eq!(run.state().elapsed_ms, 100.0);

        let mut view = NullPresenter;
        assert_eq!(run.frame(200.0, &mut view), Ok(Flow::Continue));
        assert_eq!(run.state().elapsed_ms, 200.0);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut run = run();
        let mut view = NullPresenter;
        run.frame(0.0, &mut view).unwrap();
        run.cancel();
        run.cancel();
        assert_eq!(run.frame(16.0, &mut view), Ok(Flow::Stop));
        assert_eq!(run.react(20.0, &mut view), Ok(None));
        assert_eq!(run.outcome(), None);
    }

    #[test]
    fn test_restart_resets_state() {
        let mut run = run();
        let mut view = NullPresenter;
        run.frame(0.0, &mut view).unwrap();
        run.react(650.0, &mut view).unwrap();
        run.start();
        assert_eq!(run.outcome(), None);
        assert_eq!(run.state().start_timestamp, None);
        assert!(run.is_running());
    }

    #[test]
    fn test_invalid_reaction_config() {
        let config = ReactionConfig {
            distance: 0.0,
            ..ReactionConfig::default()
        };
        assert!(ReactionRun::new(config).is_err());
    }

    #[test]
    fn test_hill_run_completes() {
        let mut hill = HillRun::new(HillConfig::default()).unwrap();
        hill.start(10.0).unwrap();
        let mut last = None;
        let mut view = |s: &HillSnapshot| {
            last = Some(*s);
            Ok::<(), PresentError>(())
        };
        assert_eq!(hill.frame(0.0, &mut view), Ok(Flow::Continue));
        assert_eq!(hill.frame(3000.0, &mut view), Ok(Flow::Continue));
        assert_eq!(hill.frame(6100.0, &mut view), Ok(Flow::Stop));
        let last = last.unwrap();
        assert!(last.finished);
        assert_eq!(last.progress, 1.0);
        assert!(!hill.is_running());
    }

    #[test]
    fn test_hill_rejects_bad_speed() {
        let mut hill = HillRun::new(HillConfig::default()).unwrap();
        assert!(hill.start(500.0).is_err());
        assert!(!hill.is_running());
    }
}
