use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The master blocking switch. Two states: Active (`true`) and Paused.
///
/// The interceptor context is the sole writer-of-record; every other
/// context holds a read-through cached copy refreshed from broadcasts
/// and requests changes via message, never by writing directly.
#[derive(Debug, Clone)]
pub struct BlockingState {
    enabled: Arc<AtomicBool>,
}

impl BlockingState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flips the switch and returns the new value.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}

impl Default for BlockingState {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_twice_restores_original_value() {
        let state = BlockingState::default();
        assert!(state.is_enabled());
        assert!(!state.toggle());
        assert!(state.toggle());
        assert!(state.is_enabled());
    }
}
