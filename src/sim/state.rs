//! Lane traffic state and configuration
//!
//! One state type serves both game variants; orientation and player control
//! are configuration, not separate code paths.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Rect, first_overlap};
use crate::error::ConfigError;
use crate::present::TrafficSnapshot;

/// Lane index in `[0, lane_count)`
pub type Lane = usize;

/// Direction traffic flows on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Cars move top to bottom, lanes are columns
    Vertical,
    /// Cars move left to right, lanes are rows
    Horizontal,
}

impl Orientation {
    /// Project a track-space rectangle to screen space
    pub fn to_screen(self, rect: Rect) -> Rect {
        match self {
            Orientation::Horizontal => rect,
            Orientation::Vertical => rect.transposed(),
        }
    }
}

/// How the player moves along the track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlayerControl {
    /// Player holds its along-track position and only changes lanes
    LaneChange { position: f32 },
    /// Player drives forward at the round speed and clears rounds
    Forward {
        start_position: f32,
        min_speed: f32,
        speed_step: f32,
        max_speed: f32,
    },
}

impl PlayerControl {
    /// Speed of the first round
    pub fn initial_speed(&self) -> f32 {
        match *self {
            PlayerControl::LaneChange { .. } => 0.0,
            PlayerControl::Forward { min_speed, .. } => min_speed,
        }
    }

    pub fn start_position(&self) -> f32 {
        match *self {
            PlayerControl::LaneChange { position } => position,
            PlayerControl::Forward { start_position, .. } => start_position,
        }
    }
}

/// Placement rules for the obstacles present when a round starts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialLayout {
    pub per_lane_min: usize,
    pub per_lane_max: usize,
    /// Along-track band the first obstacle of each lane is drawn from
    pub band_start: f32,
    pub band_span: f32,
    /// Extra offset per obstacle index within a lane
    pub spacing: f32,
    /// Player-lane obstacles with less free space than this to the player are skipped
    pub safe_gap: f32,
    /// Band for the guaranteed obstacle in the player's lane
    pub guard_start: f32,
    pub guard_span: f32,
}

/// Traffic game parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub lane_count: usize,
    /// Total width of the road across all lanes
    pub lane_extent: f32,
    /// Length of the road in the direction of travel
    pub track_extent: f32,
    pub car_length: f32,
    pub car_width: f32,
    pub orientation: Orientation,
    pub control: PlayerControl,
    pub start_lane: Lane,
    /// Obstacle speed band (units per tick)
    pub min_obstacle_speed: f32,
    pub max_obstacle_speed: f32,
    /// Inter-arrival band for spawned obstacles
    pub min_spawn_interval_ms: f64,
    pub max_spawn_interval_ms: f64,
    /// Along-track coordinate new obstacles enter at
    pub spawn_position: f32,
    /// Lanes with an obstacle this close to the spawn edge get no spawn
    pub spawn_clearance: Option<f32>,
    pub layout: InitialLayout,
}

impl TrafficConfig {
    /// Three columns, player fixed near the bottom, dodging oncoming traffic
    pub fn lane_change() -> Self {
        let track_extent = 500.0;
        let car_length = 100.0;
        Self {
            lane_count: 3,
            lane_extent: 400.0,
            track_extent,
            car_length,
            car_width: 60.0,
            orientation: Orientation::Vertical,
            control: PlayerControl::LaneChange {
                position: track_extent - car_length - 10.0,
            },
            start_lane: 1,
            min_obstacle_speed: 4.0,
            max_obstacle_speed: 6.0,
            min_spawn_interval_ms: 1000.0,
            max_spawn_interval_ms: 1500.0,
            spawn_position: -car_length,
            spawn_clearance: None,
            layout: InitialLayout {
                per_lane_min: 2,
                per_lane_max: 3,
                band_start: 0.0,
                band_span: 150.0,
                spacing: 100.0,
                safe_gap: 150.0,
                guard_start: 0.0,
                guard_span: 100.0,
            },
        }
    }

    /// Six rows, player drives right; each cleared round is faster
    pub fn forward() -> Self {
        let track_extent = 1200.0;
        let lane_extent = 480.0;
        let lane_count = 6;
        let car_length = 80.0;
        let lane_width = lane_extent / lane_count as f32;
        Self {
            lane_count,
            lane_extent,
            track_extent,
            car_length,
            car_width: (lane_width * 0.8).floor().max(40.0),
            orientation: Orientation::Horizontal,
            control: PlayerControl::Forward {
                start_position: 10.0,
                min_speed: 4.0,
                speed_step: 2.0,
                max_speed: 18.0,
            },
            start_lane: lane_count / 2,
            min_obstacle_speed: 2.5,
            max_obstacle_speed: 4.5,
            min_spawn_interval_ms: 700.0,
            max_spawn_interval_ms: 1100.0,
            spawn_position: 0.0,
            spawn_clearance: Some(car_length * 1.5),
            layout: InitialLayout {
                per_lane_min: 2,
                per_lane_max: 3,
                band_start: 100.0,
                band_span: track_extent * 0.7,
                spacing: 120.0,
                safe_gap: 30.0,
                guard_start: 200.0,
                guard_span: track_extent * 0.5,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lane_count < 1 {
            return Err(ConfigError::NoLanes);
        }
        if self.start_lane >= self.lane_count {
            return Err(ConfigError::OutOfRange {
                field: "traffic.start_lane",
                value: self.start_lane as f64,
                min: 0.0,
                max: (self.lane_count - 1) as f64,
            });
        }
        ConfigError::require_positive("traffic.lane_extent", self.lane_extent.into())?;
        ConfigError::require_positive("traffic.track_extent", self.track_extent.into())?;
        ConfigError::require_positive("traffic.car_length", self.car_length.into())?;
        ConfigError::require_positive("traffic.car_width", self.car_width.into())?;
        ConfigError::require_band(
            "traffic.obstacle_speed",
            self.min_obstacle_speed.into(),
            self.max_obstacle_speed.into(),
        )?;
        ConfigError::require_band(
            "traffic.spawn_interval_ms",
            self.min_spawn_interval_ms,
            self.max_spawn_interval_ms,
        )?;
        if self.layout.per_lane_min > self.layout.per_lane_max {
            return Err(ConfigError::Unordered {
                field: "traffic.layout.per_lane",
                min: self.layout.per_lane_min as f64,
                max: self.layout.per_lane_max as f64,
            });
        }
        self.validate_guard_band()?;
        if let PlayerControl::Forward {
            min_speed,
            speed_step,
            max_speed,
            ..
        } = self.control
        {
            ConfigError::require_band("traffic.player_speed", min_speed.into(), max_speed.into())?;
            ConfigError::require_positive("traffic.speed_step", speed_step.into())?;
        }
        Ok(())
    }

    /// The guaranteed player-lane obstacle must start clear of the player
    fn validate_guard_band(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        let player = self.control.start_position();
        let reach = self.car_length + layout.safe_gap;
        let start = layout.guard_start;
        let end = layout.guard_start + layout.guard_span;

        if end <= player - reach || start >= player + reach {
            return Ok(());
        }
        if start < player {
            Err(ConfigError::OutOfRange {
                field: "traffic.layout.guard_end",
                value: end.into(),
                min: start.into(),
                max: (player - reach).into(),
            })
        } else {
            Err(ConfigError::OutOfRange {
                field: "traffic.layout.guard_start",
                value: start.into(),
                min: (player + reach).into(),
                max: self.track_extent.into(),
            })
        }
    }

    pub fn lane_width(&self) -> f32 {
        self.lane_extent / self.lane_count as f32
    }

    /// Screen-space size of the whole track
    pub fn screen_size(&self) -> Vec2 {
        let track = Rect::from_origin_size(Vec2::ZERO, Vec2::new(self.track_extent, self.lane_extent));
        self.orientation.to_screen(track).size()
    }

    /// Track-space rectangle of a car in `lane` at along-track `position`
    pub fn car_rect(&self, lane: Lane, position: f32) -> Rect {
        let lane_width = self.lane_width();
        let across = lane as f32 * lane_width + (lane_width - self.car_width) / 2.0;
        Rect::from_origin_size(
            Vec2::new(position, across),
            Vec2::new(self.car_length, self.car_width),
        )
    }
}

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Initializing,
    Running,
    /// Player hit an obstacle
    Crashed,
    /// Player reached the far end of the track
    Cleared,
}

/// Discrete steering input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steer {
    /// Toward lane N-1
    Lower,
    /// Toward lane N+1
    Higher,
}

impl Steer {
    /// Map a `KeyboardEvent.key` value for a track laid out in `orientation`
    pub fn from_key(key: &str, orientation: Orientation) -> Option<Steer> {
        match (orientation, key) {
            (Orientation::Vertical, "ArrowLeft") => Some(Steer::Lower),
            (Orientation::Vertical, "ArrowRight") => Some(Steer::Higher),
            (Orientation::Horizontal, "ArrowUp" | "w" | "W") => Some(Steer::Lower),
            (Orientation::Horizontal, "ArrowDown" | "s" | "S") => Some(Steer::Higher),
            _ => None,
        }
    }
}

/// A lane-bound obstacle car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub lane: Lane,
    pub position: f32,
    pub speed: f32,
}

/// The player's car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub lane: Lane,
    pub position: f32,
}

/// Complete traffic simulation state
#[derive(Debug, Clone, Serialize)]
pub struct TrafficState {
    pub config: TrafficConfig,
    /// Obstacles in spawn order
    pub obstacles: Vec<Obstacle>,
    pub player: Player,
    pub phase: RoundPhase,
    /// Rounds cleared so far
    pub round_index: u32,
    pub current_speed: f32,
    /// Simulated time since the round started
    pub clock_ms: f64,
    pub next_spawn_ms: f64,
}

impl TrafficState {
    pub fn new(config: TrafficConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            player: Player {
                lane: config.start_lane,
                position: config.control.start_position(),
            },
            current_speed: config.control.initial_speed(),
            config,
            obstacles: Vec::new(),
            phase: RoundPhase::Initializing,
            round_index: 0,
            clock_ms: 0.0,
            next_spawn_ms: 0.0,
        })
    }

    /// Round is running and accepts input
    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    pub fn player_rect(&self) -> Rect {
        self.config.car_rect(self.player.lane, self.player.position)
    }

    pub fn obstacle_rects(&self) -> Vec<Rect> {
        self.obstacles
            .iter()
            .map(|o| self.config.car_rect(o.lane, o.position))
            .collect()
    }

    /// Index of the obstacle overlapping the player
    pub fn collision(&self) -> Option<usize> {
        first_overlap(&self.player_rect(), &self.obstacle_rects())
    }

    /// Change lane by one; ignored outside a running round or at the edge
    pub fn steer(&mut self, steer: Steer) -> bool {
        if !self.is_active() {
            return false;
        }
        match steer {
            Steer::Lower if self.player.lane > 0 => self.player.lane -= 1,
            Steer::Higher if self.player.lane + 1 < self.config.lane_count => {
                self.player.lane += 1
            }
            _ => return false,
        }
        true
    }

    /// Read-only view in screen coordinates
    pub fn snapshot(&self) -> TrafficSnapshot {
        let orientation = self.config.orientation;
        let lane_width = self.config.lane_width();
        TrafficSnapshot {
            phase: self.phase,
            round_index: self.round_index,
            player_speed: self.current_speed,
            player: orientation.to_screen(self.player_rect()),
            obstacles: self
                .obstacle_rects()
                .into_iter()
                .map(|r| orientation.to_screen(r))
                .collect(),
            lane_dividers: (1..self.config.lane_count)
                .map(|i| i as f32 * lane_width)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(config: TrafficConfig) -> TrafficState {
        let mut state = TrafficState::new(config).unwrap();
        state.phase = RoundPhase::Running;
        state
    }

    #[test]
    fn test_presets_validate() {
        assert!(TrafficConfig::lane_change().validate().is_ok());
        assert!(TrafficConfig::forward().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = TrafficConfig::lane_change();
        config.lane_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoLanes)));

        let mut config = TrafficConfig::lane_change();
        config.min_obstacle_speed = 8.0;
        assert!(matches!(config.validate(), Err(ConfigError::Unordered { .. })));

        let mut config = TrafficConfig::forward();
        config.track_extent = 0.0;
        assert!(config.validate().is_err());

        let mut config = TrafficConfig::forward();
        config.start_lane = 6;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_car_rect_centered_in_lane() {
        let config = TrafficConfig::lane_change();
        let rect = config.car_rect(1, 390.0);
        let lane_width = 400.0 / 3.0;
        assert!((rect.min.y - (lane_width + (lane_width - 60.0) / 2.0)).abs() < 1e-4);
        assert_eq!(rect.min.x, 390.0);
        assert_eq!(rect.size(), Vec2::new(100.0, 60.0));
    }

    #[test]
    fn test_steer_clamps_to_lanes() {
        let mut state = running(TrafficConfig::lane_change());
        assert_eq!(state.player.lane, 1);
        assert!(state.steer(Steer::Lower));
        assert!(!state.steer(Steer::Lower));
        assert_eq!(state.player.lane, 0);
        assert!(state.steer(Steer::Higher));
        assert!(state.steer(Steer::Higher));
        assert!(!state.steer(Steer::Higher));
        assert_eq!(state.player.lane, 2);
    }

    #[test]
    fn test_steer_ignored_when_not_running() {
        let mut state = TrafficState::new(TrafficConfig::lane_change()).unwrap();
        assert!(!state.steer(Steer::Lower));
        assert_eq!(state.player.lane, 1);

        state.phase = RoundPhase::Crashed;
        assert!(!state.steer(Steer::Higher));
        assert_eq!(state.player.lane, 1);
    }

    #[test]
    fn test_guard_band_must_clear_player() {
        assert!(TrafficConfig::lane_change().validate().is_ok());
        assert!(TrafficConfig::forward().validate().is_ok());

        // Band straddles the lane-change player at 390
        let mut config = TrafficConfig::lane_change();
        config.layout.guard_start = 350.0;
        config.layout.guard_span = 60.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "traffic.layout.guard_end", .. })
        ));

        // Band sits just past the player, inside the safe gap
        let mut config = TrafficConfig::lane_change();
        config.layout.guard_start = 400.0;
        config.layout.guard_span = 50.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { field: "traffic.layout.guard_start", .. })
        ));

        // Hostile bands never reach the simulator
        let mut config = TrafficConfig::lane_change();
        config.layout.guard_start = 350.0;
        config.layout.guard_span = 60.0;
        assert!(TrafficState::new(config).is_err());

        // Band starts right ahead of the forward player
        let mut config = TrafficConfig::forward();
        config.layout.guard_start = 50.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_screen_size_follows_orientation() {
        assert_eq!(TrafficConfig::lane_change().screen_size(), Vec2::new(400.0, 500.0));
        assert_eq!(TrafficConfig::forward().screen_size(), Vec2::new(1200.0, 480.0));
    }

    #[test]
    fn test_steer_from_key() {
        use Orientation::*;
        assert_eq!(Steer::from_key("ArrowLeft", Vertical), Some(Steer::Lower));
        assert_eq!(Steer::from_key("ArrowRight", Vertical), Some(Steer::Higher));
        assert_eq!(Steer::from_key("ArrowUp", Vertical), None);
        assert_eq!(Steer::from_key("w", Horizontal), Some(Steer::Lower));
        assert_eq!(Steer::from_key("ArrowDown", Horizontal), Some(Steer::Higher));
        assert_eq!(Steer::from_key("ArrowLeft", Horizontal), None);
    }

    #[test]
    fn test_collision_same_lane_only() {
        let mut state = running(TrafficConfig::lane_change());
        let position = state.player.position;
        state.obstacles.push(Obstacle {
            lane: 0,
            position,
            speed: 4.0,
        });
        assert_eq!(state.collision(), None);

        state.obstacles.push(Obstacle {
            lane: 1,
            position: position - 50.0,
            speed: 4.0,
        });
        assert_eq!(state.collision(), Some(1));
    }

    #[test]
    fn test_snapshot_projects_vertical() {
        let state = running(TrafficConfig::lane_change());
        let snapshot = state.snapshot();
        // Vertical layout: along-track becomes screen y
        assert_eq!(snapshot.player.min.y, state.player.position);
        assert_eq!(snapshot.player.size(), Vec2::new(60.0, 100.0));
        assert_eq!(snapshot.lane_dividers.len(), 2);
    }
}
