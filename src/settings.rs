//! Demo settings
//!
//! Construction-time configuration for every demo. The page may embed a JSON
//! document (`<script id="demo-settings" type="application/json">`) that
//! overrides any subset of the defaults, down to single fields inside a
//! section; everything is validated before a demo is built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::sim::{HillConfig, ReactionConfig, TrafficConfig};

/// Configuration for all demos on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reaction: ReactionConfig,
    pub hill: HillConfig,
    /// Three-lane dodge game (vertical)
    pub lane_game: TrafficConfig,
    /// Forward-scrolling game with rounds (horizontal)
    pub sideways_game: TrafficConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reaction: ReactionConfig::default(),
            hill: HillConfig::default(),
            lane_game: TrafficConfig::lane_change(),
            sideways_game: TrafficConfig::forward(),
        }
    }
}

impl Settings {
    /// Element holding page-supplied overrides
    pub const ELEMENT_ID: &'static str = "demo-settings";

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.reaction.validate()?;
        self.hill.validate()?;
        self.lane_game.validate()?;
        self.sideways_game.validate()
    }

    /// Parse and validate a settings document.
    ///
    /// The document is merged over the defaults, so a section such as
    /// `sideways_game` keeps its own preset for every field it omits.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(json)?;
        let mut merged = serde_json::to_value(Self::default())?;
        merge(&mut merged, overrides);
        let settings: Settings = serde_json::from_value(merged)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings embedded in the page (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Result<Self, ConfigError> {
        let json = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(Self::ELEMENT_ID))
            .and_then(|el| el.text_content());

        match json {
            Some(json) if !json.trim().is_empty() => {
                log::info!("Loaded settings from page");
                Self::from_json(&json)
            }
            _ => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Native builds read `REACTION_DRIVE_SETTINGS` (a JSON document) if set
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var("REACTION_DRIVE_SETTINGS") {
            Ok(json) => Self::from_json(&json),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Overlay `overrides` onto `base`, recursing into objects
fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
