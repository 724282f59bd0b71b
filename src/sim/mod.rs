//! Deterministic simulation module
//!
//! All demo logic lives here. This module must be pure and deterministic:
//! - Timestamps come from the caller, never from a clock
//! - Seeded RNG only
//! - Stable iteration order (obstacles in spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod game;
pub mod judge;
pub mod motion;
pub mod run;
pub mod state;
pub mod tick;

pub use collision::{Rect, first_overlap};
pub use game::TrafficGame;
pub use judge::{JudgeState, ReactionJudge, ReactionOutcome, ReactionWindow};
pub use motion::{
    BrakingPath, ExponentialApproach, HillClimb, HillConfig, LinearCurve, MotionProfile,
    ProgressCurve, SpatialMapping, Straight, Trajectory, hill_position,
};
pub use run::{HillRun, ReactionConfig, ReactionRun, RunState};
pub use state::{
    InitialLayout, Lane, Obstacle, Orientation, Player, PlayerControl, RoundPhase, Steer,
    TrafficConfig, TrafficState,
};
pub use tick::{TickEvent, begin_round, next_round, spawn_lanes, spawn_obstacle, tick};
