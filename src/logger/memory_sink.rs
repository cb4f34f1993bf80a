use super::{BlockEvent, BlockLogSink};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Fixed-size ring of recent block events, shared with the UI API.
pub struct MemoryLogSink {
    buffer: Arc<RwLock<VecDeque<BlockEvent>>>,
    capacity: usize,
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    // Allow sharing the buffer with API handlers
    pub fn clone_buffer(&self) -> Arc<RwLock<VecDeque<BlockEvent>>> {
        self.buffer.clone()
    }
}

impl BlockLogSink for MemoryLogSink {
    fn log(&self, event: &BlockEvent) {
        let mut buffer = self.buffer.write().unwrap();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
    }
}
