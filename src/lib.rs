//! Reaction Drive - frame-driven driving demos for the web
//!
//! Core modules:
//! - `sim`: Deterministic simulation (kinematics, reaction judging, lane traffic)
//! - `scheduler`: Cooperative per-frame loop scheduling
//! - `present`: Read-only snapshots handed to the rendering side
//! - `platform`: Browser/native platform glue
//! - `settings`: Validated demo configuration

pub mod error;
pub mod platform;
pub mod present;
pub mod scheduler;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, PresentError};
pub use scheduler::{Flow, LoopHandle, Scheduler};
pub use settings::Settings;

/// Demo configuration constants
pub mod consts {
    /// Reaction demo: total car run time (ms)
    pub const REACTION_TOTAL_MS: f64 = 700.0;
    /// Reaction demo: braking distance covered in the run (pixels)
    pub const REACTION_DISTANCE: f64 = 1000.0;
    /// Average human reaction time the judge aims for (ms)
    pub const REACTION_TARGET_MS: f64 = 670.0;
    /// Allowed deviation from the target still counted as on time (ms)
    pub const REACTION_TOLERANCE_MS: f64 = 100.0;
    /// Fraction of the run at which the pedestrian is struck
    pub const IMPACT_FRACTION: f64 = 0.8;

    /// Hill climb: run time at minimum speed before drag (ms)
    pub const HILL_BASE_DURATION_MS: f64 = 3000.0;
    pub const HILL_MIN_SPEED: f64 = 10.0;
    pub const HILL_MAX_SPEED: f64 = 50.0;
    pub const HILL_WIDTH: f64 = 600.0;
    pub const HILL_HEIGHT: f64 = 300.0;
    /// Steepness of the exponential approach toward the summit
    pub const HILL_STEEPNESS: f64 = 3.0;
    /// Quadratic drag coefficient applied to the selected speed
    pub const HILL_DRAG: f64 = 0.01;

    /// Traffic simulation step (one display refresh at 60 Hz)
    pub const TRAFFIC_TICK_MS: f64 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Frames longer than this are clamped (tab switches, breakpoints)
    pub const MAX_FRAME_MS: f64 = 100.0;
}
