//! Platform abstraction layer
//!
//! Handles host-side plumbing for:
//! - Viewport-entry triggers (fire once, then unsubscribe)
//! - Scoped event listeners
//! - Driving the scheduler from `requestAnimationFrame`

#[cfg(target_arch = "wasm32")]
pub mod web;

/// Latch for one-shot signals such as "section became visible"
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OnceTrigger {
    fired: bool,
}

impl OnceTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time only
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let mut trigger = OnceTrigger::new();
        assert!(!trigger.has_fired());
        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert!(!trigger.fire());
        assert!(trigger.has_fired());
    }
}
