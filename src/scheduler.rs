//! Cooperative frame scheduler
//!
//! Wraps the host's per-frame primitive (`requestAnimationFrame` on the web,
//! a scripted clock natively) into independent loops. The host calls
//! [`Scheduler::run_frame`] once per display refresh; every scheduled loop is
//! invoked exactly once with a timestamp that never goes backwards for that
//! loop. Loops end by returning [`Flow::Stop`] or through [`Scheduler::cancel`].

use log::{debug, trace, warn};

use crate::error::PresentError;

/// Whether a loop wants another frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Identifies one scheduled loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopHandle(u32);

type FrameCallback = Box<dyn FnMut(f64) -> Result<Flow, PresentError>>;

struct ScheduledLoop {
    handle: LoopHandle,
    callback: FrameCallback,
    last_timestamp: Option<f64>,
}

/// What happened during one [`Scheduler::run_frame`]
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Number of callbacks invoked
    pub invoked: usize,
    /// Loops that returned `Flow::Stop` and were removed
    pub finished: Vec<LoopHandle>,
    /// Loops whose presenter failed; they stay scheduled
    pub errors: Vec<(LoopHandle, PresentError)>,
}

/// Set of cooperative loops sharing one host frame source
#[derive(Default)]
pub struct Scheduler {
    loops: Vec<ScheduledLoop>,
    next_id: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new loop; its callback first runs on the next frame
    pub fn start<F>(&mut self, callback: F) -> LoopHandle
    where
        F: FnMut(f64) -> Result<Flow, PresentError> + 'static,
    {
        let handle = LoopHandle(self.next_id);
        self.next_id += 1;
        self.loops.push(ScheduledLoop {
            handle,
            callback: Box::new(callback),
            last_timestamp: None,
        });
        debug!("Loop {:?} scheduled ({} active)", handle, self.loops.len());
        handle
    }

    /// Abort a loop before its next invocation.
    ///
    /// Returns false when the loop already finished or was cancelled.
    pub fn cancel(&mut self, handle: LoopHandle) -> bool {
        match self.loops.iter().position(|l| l.handle == handle) {
            Some(index) => {
                self.loops.remove(index);
                debug!("Loop {:?} cancelled", handle);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, handle: LoopHandle) -> bool {
        self.loops.iter().any(|l| l.handle == handle)
    }

    pub fn is_idle(&self) -> bool {
        self.loops.is_empty()
    }

    /// Invoke every scheduled loop once for this display refresh
    pub fn run_frame(&mut self, timestamp: f64) -> FrameReport {
        let mut report = FrameReport::default();

        self.loops.retain_mut(|entry| {
            // Clamp so each loop observes a non-decreasing clock
            let ts = match entry.last_timestamp {
                Some(last) if timestamp < last => last,
                _ => timestamp,
            };
            entry.last_timestamp = Some(ts);
            report.invoked += 1;

            match (entry.callback)(ts) {
                Ok(Flow::Continue) => true,
                Ok(Flow::Stop) => {
                    trace!("Loop {:?} stopped at {:.1}", entry.handle, ts);
                    report.finished.push(entry.handle);
                    false
                }
                Err(e) => {
                    warn!("Loop {:?} frame failed: {}", entry.handle, e);
                    report.errors.push((entry.handle, e));
                    true
                }
            }
        });

        report
    }
}
