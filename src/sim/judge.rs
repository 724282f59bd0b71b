//! Reaction judging
//!
//! A judge is armed at the first frame of a run and decides exactly one
//! outcome: the first react signal inside the window is classified against
//! the target latency, otherwise the run expires as `Missed`.

use serde::{Deserialize, Serialize};

use crate::consts::{REACTION_TARGET_MS, REACTION_TOLERANCE_MS};
use crate::error::ConfigError;

/// Target latency and allowed deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionWindow {
    pub target_latency_ms: f64,
    pub tolerance_ms: f64,
}

impl Default for ReactionWindow {
    fn default() -> Self {
        Self {
            target_latency_ms: REACTION_TARGET_MS,
            tolerance_ms: REACTION_TOLERANCE_MS,
        }
    }
}

impl ReactionWindow {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("target_latency_ms", self.target_latency_ms)?;
        ConfigError::require_positive("tolerance_ms", self.tolerance_ms)
    }

    /// Classify a measured reaction
    pub fn classify(&self, measured_ms: f64) -> ReactionOutcome {
        if (measured_ms - self.target_latency_ms).abs() <= self.tolerance_ms {
            ReactionOutcome::OnTime { elapsed_ms: measured_ms }
        } else if measured_ms < self.target_latency_ms {
            ReactionOutcome::TooFast { elapsed_ms: measured_ms }
        } else {
            ReactionOutcome::TooSlow { elapsed_ms: measured_ms }
        }
    }
}

/// Result of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReactionOutcome {
    OnTime { elapsed_ms: f64 },
    TooFast { elapsed_ms: f64 },
    TooSlow { elapsed_ms: f64 },
    /// No reaction; carries the full run duration
    Missed { elapsed_ms: f64 },
}

impl ReactionOutcome {
    pub fn elapsed_ms(&self) -> f64 {
        match *self {
            ReactionOutcome::OnTime { elapsed_ms }
            | ReactionOutcome::TooFast { elapsed_ms }
            | ReactionOutcome::TooSlow { elapsed_ms }
            | ReactionOutcome::Missed { elapsed_ms } => elapsed_ms,
        }
    }

    /// Feedback line shown under the car
    pub fn message(&self) -> &'static str {
        match self {
            ReactionOutcome::OnTime { .. } => "Perfect timing! You reacted just in time.",
            ReactionOutcome::TooFast { .. } => "Pretty fast! You reacted quickly.",
            ReactionOutcome::TooSlow { .. } => {
                "A bit slow - that could cost you at high speeds!"
            }
            ReactionOutcome::Missed { .. } => "Too late! You didn't react in time.",
        }
    }
}

/// Judge lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JudgeState {
    Armed { armed_at: f64 },
    Reacted(ReactionOutcome),
    Expired(ReactionOutcome),
}

/// Decides one outcome per run
#[derive(Debug, Clone)]
pub struct ReactionJudge {
    window: ReactionWindow,
    total_duration_ms: f64,
    state: JudgeState,
}

impl ReactionJudge {
    /// Arm a judge at host timestamp `armed_at`
    pub fn arm(window: ReactionWindow, total_duration_ms: f64, armed_at: f64) -> Self {
        Self {
            window,
            total_duration_ms,
            state: JudgeState::Armed { armed_at },
        }
    }

    pub fn state(&self) -> JudgeState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, JudgeState::Armed { .. })
    }

    /// Decided outcome, if any
    pub fn outcome(&self) -> Option<ReactionOutcome> {
        match self.state {
            JudgeState::Armed { .. } => None,
            JudgeState::Reacted(outcome) | JudgeState::Expired(outcome) => Some(outcome),
        }
    }

    /// Handle a react signal at `now`.
    ///
    /// Returns the outcome only on the transition that decides it. A signal
    /// at or past the window end expires the judge instead.
    pub fn react(&mut self, now: f64) -> Option<ReactionOutcome> {
        let JudgeState::Armed { armed_at } = self.state else {
            return None;
        };
        let measured = now - armed_at;
        if measured >= self.total_duration_ms {
            return self.expire_now();
        }
        let outcome = self.window.classify(measured);
        self.state = JudgeState::Reacted(outcome);
        Some(outcome)
    }

    /// Expire once `now` reaches the end of the window
    pub fn poll(&mut self, now: f64) -> Option<ReactionOutcome> {
        match self.state {
            JudgeState::Armed { armed_at } if now - armed_at >= self.total_duration_ms => {
                self.expire_now()
            }
            _ => None,
        }
    }

    /// Expire immediately (the run ended without a reaction)
    pub fn expire_now(&mut self) -> Option<ReactionOutcome> {
        if !self.is_armed() {
            return None;
        }
        let outcome = ReactionOutcome::Missed {
            elapsed_ms: self.total_duration_ms,
        };
        self.state = JudgeState::Expired(outcome);
        Some(outcome)
    }
}
