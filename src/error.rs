//! Error types
//!
//! Configuration problems are fatal and surface from constructors only.
//! Presentation problems surface from frame ticks after the simulation
//! state for that tick has been committed.

use thiserror::Error;

/// Invalid demo configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A duration, distance, extent or speed that must be strictly positive
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Offending field
        field: &'static str,
        /// Value supplied
        value: f64,
    },

    /// A `(min, max)` band given in the wrong order
    #[error("{field} band is unordered: min {min} > max {max}")]
    Unordered {
        /// Offending field
        field: &'static str,
        min: f64,
        max: f64,
    },

    /// A value outside its allowed `[min, max]` range
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A track needs at least one lane
    #[error("lane count must be at least 1")]
    NoLanes,

    /// Settings document could not be parsed
    #[error("settings parse failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Check that `value` is strictly positive (and not NaN)
    pub fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
        if value > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::NonPositive { field, value })
        }
    }

    /// Check that a `(min, max)` band is positive and ordered
    pub fn require_band(field: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
        Self::require_positive(field, min)?;
        if min > max {
            return Err(ConfigError::Unordered { field, min, max });
        }
        Ok(())
    }
}

/// Failure on the rendering side of a frame tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PresentError {
    /// The collaborator needed to render is missing (element, context, callback)
    #[error("presenter unavailable: {0}")]
    Unavailable(&'static str),

    /// The presenter ran but failed
    #[error("presenter failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert!(ConfigError::require_positive("distance", 1.0).is_ok());
        assert!(matches!(
            ConfigError::require_positive("distance", 0.0),
            Err(ConfigError::NonPositive { field: "distance", .. })
        ));
        assert!(ConfigError::require_positive("distance", f64::NAN).is_err());
    }

    #[test]
    fn test_require_band() {
        assert!(ConfigError::require_band("speed", 2.0, 2.0).is_ok());
        assert!(matches!(
            ConfigError::require_band("speed", 3.0, 2.0),
            Err(ConfigError::Unordered { .. })
        ));
        assert!(ConfigError::require_band("speed", -1.0, 2.0).is_err());
    }
}
