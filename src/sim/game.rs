//! Traffic game driver
//!
//! Converts host frame timestamps into fixed simulation ticks, advances
//! cleared rounds, and hands a snapshot to the presenter after each frame.

use log::info;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::state::{RoundPhase, Steer, TrafficConfig, TrafficState};
use super::tick::{TickEvent, begin_round, next_round, tick};
use crate::consts::{MAX_FRAME_MS, MAX_SUBSTEPS, TRAFFIC_TICK_MS};
use crate::error::{ConfigError, PresentError};
use crate::present::{Presenter, TrafficSnapshot};
use crate::scheduler::Flow;

/// One traffic game instance with its own seeded RNG
#[derive(Debug, Clone)]
pub struct TrafficGame {
    state: TrafficState,
    rng: Pcg32,
    seed: u64,
    accumulator: f64,
    last_timestamp: Option<f64>,
}

impl TrafficGame {
    /// Build the game; its first round starts on the first frame
    pub fn new(config: TrafficConfig, seed: u64) -> Result<Self, ConfigError> {
        let state = TrafficState::new(config)?;
        let mut game = Self {
            state,
            rng: Pcg32::seed_from_u64(seed),
            seed,
            accumulator: 0.0,
            last_timestamp: None,
        };
        game.restart(seed);
        Ok(game)
    }

    /// Start over from the first round with a new seed.
    ///
    /// The game waits in `Initializing` until the next frame, so input
    /// arriving before the loop runs is ignored.
    pub fn restart(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = Pcg32::seed_from_u64(seed);
        self.accumulator = 0.0;
        self.last_timestamp = None;
        self.state.round_index = 0;
        self.state.phase = RoundPhase::Initializing;
        self.state.obstacles.clear();
        self.state.player.lane = self.state.config.start_lane;
        self.state.player.position = self.state.config.control.start_position();
        info!("Traffic game reset with seed: {}", seed);
    }

    fn begin(&mut self) {
        let speed = self.state.config.control.initial_speed();
        begin_round(&mut self.state, speed, &mut self.rng);
    }

    pub fn state(&self) -> &TrafficState {
        &self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Directional input; ignored unless a round is running
    pub fn steer(&mut self, steer: Steer) -> bool {
        self.state.steer(steer)
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        self.state.snapshot()
    }

    /// Run the ticks owed up to `timestamp` and present the result
    pub fn frame<P>(&mut self, timestamp: f64, view: &mut P) -> Result<Flow, PresentError>
    where
        P: Presenter<TrafficSnapshot> + ?Sized,
    {
        if self.state.phase == RoundPhase::Initializing {
            self.begin();
        }
        if !self.state.is_active() {
            return Ok(Flow::Stop);
        }

        let dt = match self.last_timestamp {
            Some(last) => (timestamp - last).clamp(0.0, MAX_FRAME_MS),
            None => TRAFFIC_TICK_MS,
        };
        self.last_timestamp = Some(timestamp);
        self.accumulator += dt;

        let mut substeps = 0;
        while self.accumulator >= TRAFFIC_TICK_MS && substeps < MAX_SUBSTEPS {
            self.accumulator -= TRAFFIC_TICK_MS;
            substeps += 1;
            match tick(&mut self.state, &mut self.rng) {
                TickEvent::Cleared => next_round(&mut self.state, &mut self.rng),
                TickEvent::Crashed { .. } | TickEvent::Idle => break,
                TickEvent::Advanced => {}
            }
        }
        if substeps == MAX_SUBSTEPS {
            // Drop the backlog rather than catch up
            self.accumulator = self.accumulator.min(TRAFFIC_TICK_MS);
        }

        view.present(&self.state.snapshot())?;

        Ok(match self.state.phase {
            RoundPhase::Crashed => Flow::Stop,
            _ => Flow::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::present::NullPresenter;
    use crate::sim::state::Obstacle;

    #[test]
    fn test_new_game_waits_for_first_frame() {
        let mut game = TrafficGame::new(TrafficConfig::forward(), 1).unwrap();
        assert_eq!(game.state().phase, RoundPhase::Initializing);
        assert!(!game.is_active());
        assert!(game.state().obstacles.is_empty());

        game.frame(0.0, &mut NullPresenter).unwrap();
        assert!(game.is_active());
        assert_eq!(game.state().round_index, 0);
        assert_eq!(game.state().current_speed, 4.0);
        assert!(!game.state().obstacles.is_empty());
    }

    #[test]
    fn test_steer_before_first_frame_ignored() {
        for seed in 0..200 {
            let mut game = TrafficGame::new(TrafficConfig::lane_change(), seed).unwrap();
            let lane = game.state().player.lane;
            assert!(!game.steer(Steer::Lower));
            assert!(!game.steer(Steer::Higher));
            assert_eq!(game.state().player.lane, lane);
            assert_eq!(
                game.frame(0.0, &mut NullPresenter),
                Ok(Flow::Continue),
                "seed {seed} crashed on the first frame"
            );
        }
    }

    #[test]
    fn test_restart_waits_for_next_frame() {
        let mut game = TrafficGame::new(TrafficConfig::lane_change(), 9).unwrap();
        let mut view = NullPresenter;
        game.frame(0.0, &mut view).unwrap();
        assert!(game.steer(Steer::Lower));

        game.restart(10);
        assert!(!game.steer(Steer::Lower));
        assert_eq!(game.state().player.lane, game.state().config.start_lane);
        game.frame(100.0, &mut view).unwrap();
        assert!(game.is_active());
    }

    #[test]
    fn test_first_frame_runs_one_tick() {
        let mut game = TrafficGame::new(TrafficConfig::forward(), 2).unwrap();
        let start = game.state().config.control.start_position();
        let mut view = NullPresenter;
        assert_eq!(game.frame(500.0, &mut view), Ok(Flow::Continue));
        assert_eq!(game.state().player.position, start + 4.0);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut game = TrafficGame::new(TrafficConfig::lane_change(), 3).unwrap();
        let mut view = NullPresenter;
        game.frame(0.0, &mut view).unwrap();
        let clock = game.state().clock_ms;
        // A 10 s stall runs at most MAX_SUBSTEPS ticks
        game.frame(10_000.0, &mut view).unwrap();
        let ticks = ((game.state().clock_ms - clock) / TRAFFIC_TICK_MS).round() as u32;
        assert!(ticks <= MAX_SUBSTEPS);
    }

    #[test]
    fn test_crash_stops_loop() {
        let mut game = TrafficGame::new(TrafficConfig::lane_change(), 4).unwrap();
        game.begin();
        let position = game.state.player.position;
        game.state.obstacles = vec![Obstacle {
            lane: game.state.player.lane,
            position: position - 99.0,
            speed: 4.0,
        }];
        let mut view = NullPresenter;
        assert_eq!(game.frame(0.0, &mut view), Ok(Flow::Stop));
        assert_eq!(game.state().phase, RoundPhase::Crashed);
        assert_eq!(game.frame(16.0, &mut view), Ok(Flow::Stop));
        assert!(!game.steer(Steer::Lower));
    }

    #[test]
    fn test_cleared_round_advances() {
        let mut game = TrafficGame::new(TrafficConfig::forward(), 5).unwrap();
        game.begin();
        let finish = game.state.config.track_extent - game.state.config.car_length;
        game.state.obstacles.clear();
        game.state.next_spawn_ms = f64::MAX;
        game.state.player.position = finish - 1.0;

        let mut view = NullPresenter;
        assert_eq!(game.frame(0.0, &mut view), Ok(Flow::Continue));
        assert_eq!(game.state().round_index, 1);
        assert_eq!(game.state().current_speed, 6.0);
        assert!(game.is_active());
    }

    #[test]
    fn test_present_error_after_commit() {
        let mut game = TrafficGame::new(TrafficConfig::forward(), 6).unwrap();
        let start = game.state().config.control.start_position();
        let mut failing = |_: &TrafficSnapshot| Err::<(), _>(PresentError::Unavailable("canvas"));
        assert!(game.frame(0.0, &mut failing).is_err());
        assert_eq!(game.state().player.position, start + 4.0);

        let mut view = NullPresenter;
        assert!(game.frame(17.0, &mut view).is_ok());
    }

    #[test]
    fn test_restart_is_reproducible() {
        let mut game = TrafficGame::new(TrafficConfig::forward(), 77).unwrap();
        let mut view = NullPresenter;
        game.frame(0.0, &mut view).unwrap();
        let first = game.state().obstacles.clone();
        game.frame(17.0, &mut view).unwrap();
        game.restart(77);
        game.frame(500.0, &mut view).unwrap();
        assert_eq!(game.state().obstacles, first);
        assert_eq!(game.seed(), 77);
    }
}
