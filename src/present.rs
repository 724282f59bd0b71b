//! Presentation boundary
//!
//! The simulation hands a read-only snapshot to a [`Presenter`] once per
//! frame. Presenters draw or mutate styles; they never see mutable
//! simulation state.

use glam::DVec2;
use serde::Serialize;

use crate::error::PresentError;
use crate::sim::collision::Rect;
use crate::sim::judge::ReactionOutcome;
use crate::sim::state::RoundPhase;

/// Renders snapshots of type `S`
pub trait Presenter<S: ?Sized> {
    fn present(&mut self, snapshot: &S) -> Result<(), PresentError>;
}

impl<S: ?Sized, F> Presenter<S> for F
where
    F: FnMut(&S) -> Result<(), PresentError>,
{
    fn present(&mut self, snapshot: &S) -> Result<(), PresentError> {
        self(snapshot)
    }
}

/// Discards every snapshot (headless runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl<S: ?Sized> Presenter<S> for NullPresenter {
    fn present(&mut self, _snapshot: &S) -> Result<(), PresentError> {
        Ok(())
    }
}

/// Reaction demo frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReactionSnapshot {
    pub elapsed_ms: f64,
    /// Car position along the road
    pub position: f64,
    pub running: bool,
    /// Pedestrian has been struck
    pub impact: bool,
    /// True only on the frame the impact happens
    pub impact_started: bool,
    pub outcome: Option<ReactionOutcome>,
    /// True only on the snapshot that reports the outcome
    pub decided: bool,
}

/// Hill-climb demo frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HillSnapshot {
    pub elapsed_ms: f64,
    pub selected_speed: f64,
    pub progress: f64,
    pub position: DVec2,
    pub finished: bool,
}

/// Traffic game frame, rectangles already in screen space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSnapshot {
    pub phase: RoundPhase,
    pub round_index: u32,
    pub player_speed: f32,
    pub player: Rect,
    pub obstacles: Vec<Rect>,
    /// Screen-space lane divider offsets
    pub lane_dividers: Vec<f32>,
}
