//! Duration-driven motion
//!
//! A [`ProgressCurve`] turns elapsed time into normalized progress in `[0, 1]`;
//! a [`SpatialMapping`] turns progress into a position. The reaction demo
//! uses uniformly accelerated motion along a straight line, the hill demo
//! linear progress over an exponential-approach slope.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maps elapsed time to normalized progress
pub trait ProgressCurve {
    /// Time at which progress reaches 1
    fn duration_ms(&self) -> f64;

    /// Progress in `[0, 1]`, non-decreasing in `elapsed_ms`
    fn progress(&self, elapsed_ms: f64) -> f64;

    fn is_complete(&self, elapsed_ms: f64) -> bool {
        elapsed_ms >= self.duration_ms()
    }
}

/// Maps normalized progress to a position
pub trait SpatialMapping {
    fn map(&self, progress: f64) -> DVec2;
}

/// Uniformly accelerated 1-D motion from rest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionProfile {
    duration_ms: f64,
    distance: f64,
    acceleration: f64,
}

impl MotionProfile {
    /// Build a profile covering `distance` in `duration_ms`; acceleration is `2d/t²`
    pub fn new(duration_ms: f64, distance: f64) -> Result<Self, ConfigError> {
        ConfigError::require_positive("duration_ms", duration_ms)?;
        ConfigError::require_positive("distance", distance)?;
        let secs = duration_ms / 1000.0;
        Ok(Self {
            duration_ms,
            distance,
            acceleration: 2.0 * distance / (secs * secs),
        })
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Acceleration in distance units per second²
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// Distance covered after `elapsed_ms`: `a·t²/2`, clamped to `[0, distance]`
    pub fn position(&self, elapsed_ms: f64) -> f64 {
        if elapsed_ms <= 0.0 {
            return 0.0;
        }
        if elapsed_ms >= self.duration_ms {
            return self.distance;
        }
        let t = elapsed_ms / 1000.0;
        (0.5 * self.acceleration * t * t).min(self.distance)
    }
}

impl ProgressCurve for MotionProfile {
    fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    fn progress(&self, elapsed_ms: f64) -> f64 {
        self.position(elapsed_ms) / self.distance
    }
}

/// Constant-rate progress
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearCurve {
    duration_ms: f64,
}

impl LinearCurve {
    pub fn new(duration_ms: f64) -> Result<Self, ConfigError> {
        ConfigError::require_positive("duration_ms", duration_ms)?;
        Ok(Self { duration_ms })
    }
}

impl ProgressCurve for LinearCurve {
    fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    fn progress(&self, elapsed_ms: f64) -> f64 {
        (elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
    }
}

/// Straight line along +x
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Straight {
    pub distance: f64,
}

impl SpatialMapping for Straight {
    fn map(&self, progress: f64) -> DVec2 {
        DVec2::new(self.distance * progress, 0.0)
    }
}

/// Slope that rises quickly and flattens toward `height`
///
/// `y = height · (1 - exp(-steepness · x / width))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialApproach {
    pub width: f64,
    pub height: f64,
    pub steepness: f64,
}

impl SpatialMapping for ExponentialApproach {
    fn map(&self, progress: f64) -> DVec2 {
        let x = self.width * progress;
        let y = self.height * (1.0 - (-self.steepness * x / self.width).exp());
        DVec2::new(x, y)
    }
}

/// A progress curve paired with the path it drives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory<C, M> {
    pub curve: C,
    pub mapping: M,
}

impl<C: ProgressCurve, M: SpatialMapping> Trajectory<C, M> {
    pub fn new(curve: C, mapping: M) -> Self {
        Self { curve, mapping }
    }

    pub fn position_at(&self, elapsed_ms: f64) -> DVec2 {
        self.mapping.map(self.curve.progress(elapsed_ms))
    }

    pub fn duration_ms(&self) -> f64 {
        self.curve.duration_ms()
    }

    pub fn is_complete(&self, elapsed_ms: f64) -> bool {
        self.curve.is_complete(elapsed_ms)
    }
}

/// The reaction demo's car path
pub type BrakingPath = Trajectory<MotionProfile, Straight>;

impl BrakingPath {
    pub fn braking(profile: MotionProfile) -> Self {
        let distance = profile.distance();
        Trajectory::new(profile, Straight { distance })
    }
}

/// Hill-climb parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillConfig {
    pub base_duration_ms: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub width: f64,
    pub height: f64,
    pub steepness: f64,
    pub drag: f64,
}

impl Default for HillConfig {
    fn default() -> Self {
        use crate::consts::*;
        Self {
            base_duration_ms: HILL_BASE_DURATION_MS,
            min_speed: HILL_MIN_SPEED,
            max_speed: HILL_MAX_SPEED,
            width: HILL_WIDTH,
            height: HILL_HEIGHT,
            steepness: HILL_STEEPNESS,
            drag: HILL_DRAG,
        }
    }
}

impl HillConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("hill.base_duration_ms", self.base_duration_ms)?;
        ConfigError::require_band("hill.speed", self.min_speed, self.max_speed)?;
        ConfigError::require_positive("hill.width", self.width)?;
        ConfigError::require_positive("hill.height", self.height)?;
        ConfigError::require_positive("hill.steepness", self.steepness)?;
        if self.drag < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "hill.drag",
                value: self.drag,
            });
        }
        Ok(())
    }

    /// Climb time for a selected speed; faster is quicker until drag dominates
    pub fn duration_for(&self, selected_speed: f64) -> f64 {
        self.base_duration_ms
            * (self.min_speed / selected_speed)
            * (1.0 + self.drag * selected_speed * selected_speed)
    }
}

pub type HillClimb = Trajectory<LinearCurve, ExponentialApproach>;

impl HillClimb {
    /// Hill trajectory for `selected_speed`, which must lie in `[min_speed, max_speed]`
    pub fn climb(config: &HillConfig, selected_speed: f64) -> Result<Self, ConfigError> {
        ConfigError::require_positive("hill.selected_speed", selected_speed)?;
        if selected_speed < config.min_speed || selected_speed > config.max_speed {
            return Err(ConfigError::OutOfRange {
                field: "hill.selected_speed",
                value: selected_speed,
                min: config.min_speed,
                max: config.max_speed,
            });
        }
        let curve = LinearCurve::new(config.duration_for(selected_speed))?;
        Ok(Trajectory::new(
            curve,
            ExponentialApproach {
                width: config.width,
                height: config.height,
                steepness: config.steepness,
            },
        ))
    }
}

/// Hill position for a selected speed after `elapsed_ms`
pub fn hill_position(
    config: &HillConfig,
    selected_speed: f64,
    elapsed_ms: f64,
) -> Result<DVec2, ConfigError> {
    Ok(HillClimb::climb(config, selected_speed)?.position_at(elapsed_ms))
}
