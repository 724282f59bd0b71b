//! Fixed timestep traffic tick
//!
//! Round setup, spawning and the per-tick update. All randomness comes from
//! the injected `Rng`, so a seeded generator replays a round exactly.

use log::{debug, info, trace};
use rand::Rng;

use super::state::{Lane, Obstacle, PlayerControl, RoundPhase, TrafficState};
use crate::consts::TRAFFIC_TICK_MS;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickEvent {
    /// Round not running; nothing changed
    Idle,
    Advanced,
    /// Player hit the obstacle at this index
    Crashed { obstacle: usize },
    /// Player reached the far end of the track
    Cleared,
}

/// Reset the player and lay out a fresh set of obstacles at `speed`
pub fn begin_round<R: Rng>(state: &mut TrafficState, speed: f32, rng: &mut R) {
    state.phase = RoundPhase::Initializing;
    state.current_speed = speed;
    state.player.lane = state.config.start_lane;
    state.player.position = state.config.control.start_position();
    state.clock_ms = 0.0;
    // First spawn happens on the first tick
    state.next_spawn_ms = 0.0;
    state.obstacles = initial_obstacles(state, rng);
    state.phase = RoundPhase::Running;
    info!(
        "Round {} started at speed {:.1} with {} obstacles",
        state.round_index + 1,
        speed,
        state.obstacles.len()
    );
}

/// Start the round after a cleared one, faster up to the cap
pub fn next_round<R: Rng>(state: &mut TrafficState, rng: &mut R) {
    let speed = match state.config.control {
        PlayerControl::Forward {
            speed_step,
            max_speed,
            ..
        } => (state.current_speed + speed_step).min(max_speed),
        PlayerControl::LaneChange { .. } => state.current_speed,
    };
    state.round_index += 1;
    begin_round(state, speed, rng);
}

fn draw_speed<R: Rng>(state: &TrafficState, rng: &mut R) -> f32 {
    rng.random_range(state.config.min_obstacle_speed..=state.config.max_obstacle_speed)
}

fn initial_obstacles<R: Rng>(state: &TrafficState, rng: &mut R) -> Vec<Obstacle> {
    let config = &state.config;
    let layout = config.layout;
    let player = state.player;
    let mut obstacles = Vec::new();

    for lane in 0..config.lane_count {
        let count = rng.random_range(layout.per_lane_min..=layout.per_lane_max);
        for index in 0..count {
            let guarded = lane == player.lane && index == 0;
            let position = if guarded {
                layout.guard_start + rng.random::<f32>() * layout.guard_span
            } else {
                layout.band_start + rng.random::<f32>() * layout.band_span + index as f32 * layout.spacing
            };
            if lane == player.lane
                && !guarded
                && edge_gap(position, player.position, config.car_length) < layout.safe_gap
            {
                continue;
            }
            obstacles.push(Obstacle {
                lane,
                position,
                speed: draw_speed(state, rng),
            });
        }
    }

    if !obstacles.iter().any(|o| o.lane == player.lane) {
        let position = layout.guard_start + rng.random::<f32>() * layout.guard_span;
        obstacles.push(Obstacle {
            lane: player.lane,
            position,
            speed: draw_speed(state, rng),
        });
    }

    obstacles
}

/// Free space between two equal-length cars in the same lane
fn edge_gap(a: f32, b: f32, car_length: f32) -> f32 {
    (a - b).abs() - car_length
}

/// Lanes a new obstacle may enter
pub fn spawn_lanes(state: &TrafficState) -> Vec<Lane> {
    let config = &state.config;
    match config.spawn_clearance {
        None => (0..config.lane_count).collect(),
        Some(clearance) => {
            let edge = config.spawn_position + clearance;
            (0..config.lane_count)
                .filter(|&lane| {
                    let player_near = state.player.lane == lane && state.player.position < edge;
                    !player_near
                        && !state
                            .obstacles
                            .iter()
                            .any(|o| o.lane == lane && o.position < edge)
                })
                .collect()
        }
    }
}

/// Admit one obstacle at the spawn edge, if any lane is free
pub fn spawn_obstacle<R: Rng>(state: &mut TrafficState, rng: &mut R) -> Option<Lane> {
    let lanes = spawn_lanes(state);
    if lanes.is_empty() {
        trace!("Spawn skipped, every lane blocked");
        return None;
    }
    let lane = lanes[rng.random_range(0..lanes.len())];
    let speed = draw_speed(state, rng);
    state.obstacles.push(Obstacle {
        lane,
        position: state.config.spawn_position,
        speed,
    });
    Some(lane)
}

/// Advance the round by one fixed step
pub fn tick<R: Rng>(state: &mut TrafficState, rng: &mut R) -> TickEvent {
    if !state.is_active() {
        return TickEvent::Idle;
    }

    state.clock_ms += TRAFFIC_TICK_MS;

    for obstacle in &mut state.obstacles {
        obstacle.position += obstacle.speed;
    }
    let track_extent = state.config.track_extent;
    state.obstacles.retain(|o| o.position < track_extent);

    if let PlayerControl::Forward { .. } = state.config.control {
        state.player.position += state.current_speed;
        let finish = track_extent - state.config.car_length;
        if state.player.position >= finish {
            state.player.position = finish;
            state.phase = RoundPhase::Cleared;
            info!("Round {} cleared", state.round_index + 1);
            return TickEvent::Cleared;
        }
    }

    if let Some(obstacle) = state.collision() {
        state.phase = RoundPhase::Crashed;
        info!(
            "Crash in lane {} during round {}",
            state.player.lane,
            state.round_index + 1
        );
        return TickEvent::Crashed { obstacle };
    }

    if state.clock_ms >= state.next_spawn_ms {
        if let Some(lane) = spawn_obstacle(state, rng) {
            debug!("Spawned obstacle in lane {}", lane);
        }
        let interval = rng.random_range(
            state.config.min_spawn_interval_ms..=state.config.max_spawn_interval_ms,
        );
        state.next_spawn_ms = state.clock_ms + interval;
    }

    TickEvent::Advanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Steer, TrafficConfig};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn started(config: TrafficConfig, seed: u64) -> (TrafficState, Pcg32) {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut state = TrafficState::new(config).unwrap();
        let speed = state.config.control.initial_speed();
        begin_round(&mut state, speed, &mut rng);
        (state, rng)
    }

    #[test]
    fn test_initial_layout_covers_player_lane() {
        for seed in 0..200 {
            let mut config = TrafficConfig::forward();
            config.lane_count = 3;
            config.start_lane = 1;
            let (state, _) = started(config, seed);
            assert!(
                state.obstacles.iter().any(|o| o.lane == state.player.lane),
                "seed {seed} left the player's lane empty"
            );
        }
    }

    #[test]
    fn test_initial_layout_guarantee_with_empty_lanes() {
        let mut config = TrafficConfig::lane_change();
        config.layout.per_lane_min = 0;
        config.layout.per_lane_max = 0;
        let (state, _) = started(config, 7);
        assert_eq!(state.obstacles.len(), 1);
        assert_eq!(state.obstacles[0].lane, state.player.lane);
    }

    #[test]
    fn test_initial_layout_keeps_safe_gap() {
        for config in [TrafficConfig::lane_change(), TrafficConfig::forward()] {
            for seed in 0..200 {
                let (mut state, mut rng) = started(config.clone(), seed);
                let gap = state.config.layout.safe_gap;
                let length = state.config.car_length;
                assert!(state.collision().is_none());
                for o in state.obstacles.iter().filter(|o| o.lane == state.player.lane) {
                    assert!(edge_gap(o.position, state.player.position, length) >= gap);
                }
                assert_eq!(tick(&mut state, &mut rng), TickEvent::Advanced, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_initial_counts_and_speeds() {
        let (state, _) = started(TrafficConfig::forward(), 42);
        let config = &state.config;
        for lane in 0..config.lane_count {
            let count = state.obstacles.iter().filter(|o| o.lane == lane).count();
            if lane != state.player.lane {
                assert!((2..=3).contains(&count));
            }
        }
        for o in &state.obstacles {
            assert!(o.speed >= config.min_obstacle_speed && o.speed <= config.max_obstacle_speed);
        }
    }

    #[test]
    fn test_obstacles_advance_and_retire() {
        let (mut state, mut rng) = started(TrafficConfig::lane_change(), 1);
        state.obstacles = vec![
            Obstacle { lane: 0, position: 10.0, speed: 5.0 },
            Obstacle { lane: 2, position: 498.0, speed: 5.0 },
        ];
        // Hold off spawning
        state.next_spawn_ms = f64::MAX;

        assert_eq!(tick(&mut state, &mut rng), TickEvent::Advanced);
        assert_eq!(state.obstacles.len(), 1);
        assert_eq!(state.obstacles[0].position, 15.0);
    }

    #[test]
    fn test_first_tick_spawns() {
        let (mut state, mut rng) = started(TrafficConfig::lane_change(), 3);
        state.obstacles.clear();
        tick(&mut state, &mut rng);
        assert_eq!(state.obstacles.len(), 1);
        assert_eq!(state.obstacles[0].position, state.config.spawn_position);

        let interval = state.next_spawn_ms - state.clock_ms;
        assert!((1000.0..=1500.0).contains(&interval));
    }

    #[test]
    fn test_spawn_avoids_blocked_lanes() {
        let (mut state, mut rng) = started(TrafficConfig::forward(), 5);
        state.obstacles = (0..6)
            .filter(|&lane| lane != 4)
            .map(|lane| Obstacle { lane, position: 10.0, speed: 3.0 })
            .collect();
        assert_eq!(spawn_lanes(&state), vec![4]);
        assert_eq!(spawn_obstacle(&mut state, &mut rng), Some(4));

        // Lane 4 is now blocked too
        assert_eq!(spawn_obstacle(&mut state, &mut rng), None);
    }

    #[test]
    fn test_spawn_avoids_player_near_edge() {
        let (mut state, _) = started(TrafficConfig::forward(), 6);
        state.obstacles.clear();
        assert!(!spawn_lanes(&state).contains(&state.player.lane));
        assert_eq!(spawn_lanes(&state).len(), 5);

        state.player.position = 500.0;
        assert_eq!(spawn_lanes(&state).len(), 6);
    }

    #[test]
    fn test_crash_ends_round() {
        let (mut state, mut rng) = started(TrafficConfig::lane_change(), 9);
        let position = state.player.position;
        state.obstacles = vec![Obstacle { lane: 1, position: position - 104.0, speed: 5.0 }];
        state.next_spawn_ms = f64::MAX;

        assert_eq!(tick(&mut state, &mut rng), TickEvent::Crashed { obstacle: 0 });
        assert_eq!(state.phase, RoundPhase::Crashed);
        assert!(!state.steer(Steer::Lower));
        assert_eq!(tick(&mut state, &mut rng), TickEvent::Idle);
    }

    #[test]
    fn test_dodge_avoids_crash() {
        let (mut state, mut rng) = started(TrafficConfig::lane_change(), 9);
        let position = state.player.position;
        state.obstacles = vec![Obstacle { lane: 1, position: position - 104.0, speed: 5.0 }];
        state.next_spawn_ms = f64::MAX;

        assert!(state.steer(Steer::Higher));
        assert_eq!(tick(&mut state, &mut rng), TickEvent::Advanced);
    }

    #[test]
    fn test_forward_player_clears_track() {
        let (mut state, mut rng) = started(TrafficConfig::forward(), 11);
        state.obstacles.clear();
        state.next_spawn_ms = f64::MAX;
        let finish = state.config.track_extent - state.config.car_length;

        let mut ticks = 0;
        while tick(&mut state, &mut rng) == TickEvent::Advanced {
            ticks += 1;
        }
        assert_eq!(state.phase, RoundPhase::Cleared);
        assert_eq!(state.player.position, finish);
        // 10 + 4 * n reaches 1120 on tick 278
        assert_eq!(ticks, 277);
    }

    #[test]
    fn test_round_speed_progression() {
        let (mut state, mut rng) = started(TrafficConfig::forward(), 13);
        for n in 1..=10u32 {
            next_round(&mut state, &mut rng);
            let expected = (4.0 + n as f32 * 2.0).min(18.0);
            assert_eq!(state.current_speed, expected);
            assert_eq!(state.round_index, n);
            assert_eq!(state.phase, RoundPhase::Running);
            assert_eq!(state.player.position, 10.0);
        }
    }

    #[test]
    fn test_lane_change_player_stays_put() {
        let (mut state, mut rng) = started(TrafficConfig::lane_change(), 17);
        state.obstacles.clear();
        state.next_spawn_ms = f64::MAX;
        let position = state.player.position;
        for _ in 0..100 {
            tick(&mut state, &mut rng);
        }
        assert_eq!(state.player.position, position);
        assert_eq!(state.phase, RoundPhase::Running);
    }

    #[test]
    fn test_determinism() {
        let run = |seed| {
            let (mut state, mut rng) = started(TrafficConfig::forward(), seed);
            for _ in 0..120 {
                if tick(&mut state, &mut rng) != TickEvent::Advanced {
                    break;
                }
            }
            (state.obstacles.clone(), state.phase)
        };
        assert_eq!(run(99), run(99));
    }
}
