pub mod console_sink;
pub mod memory_sink;
pub mod types;

pub use self::console_sink::ConsoleLogSink;
pub use self::memory_sink::MemoryLogSink;
pub use self::types::{BlockEvent, BlockLogSink};

use crate::config::LoggingConfig;
use crate::stats::{unix_now, BlockKind};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fan-out logger for block events. Each sink gets its own channel
/// and consumer task; a full buffer drops the event rather than
/// blocking the interception hot path.
pub struct BlockLogger {
    sinks: Vec<mpsc::Sender<BlockEvent>>,
}

impl BlockLogger {
    pub fn new(config: LoggingConfig, extra_sinks: Vec<Box<dyn BlockLogSink>>) -> Arc<Self> {
        let mut boxed: Vec<Box<dyn BlockLogSink>> = Vec::new();

        for sink_type in &config.block_log_sinks {
            if sink_type == "console" {
                boxed.push(Box::new(ConsoleLogSink::new(config.clone())));
            } else {
                tracing::warn!("unknown block log sink type: {}", sink_type);
            }
        }
        boxed.extend(extra_sinks);

        let mut sinks = Vec::new();
        for sink in boxed {
            let (tx, mut rx) = mpsc::channel(1000);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    sink.log(&event);
                }
            });
            sinks.push(tx);
        }

        Arc::new(Self { sinks })
    }

    /// A logger with no sinks, for components wired up in tests.
    pub fn disabled() -> Arc<Self> {
        Arc::new(Self { sinks: Vec::new() })
    }

    pub fn log(&self, layer: BlockKind, target: &str, rule: &'static str) {
        if self.sinks.is_empty() {
            return;
        }
        let event = BlockEvent {
            layer,
            target: target.to_string(),
            rule,
            at: unix_now(),
        };
        let len = self.sinks.len();
        for (i, sink) in self.sinks.iter().enumerate() {
            // Fire and forget, don't block caller if buffer full
            if i == len - 1 {
                let _ = sink.try_send(event);
                break;
            }
            let _ = sink.try_send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_keeps_recent_events_bounded() {
        let sink = MemoryLogSink::new(2);
        let buffer = sink.clone_buffer();
        let logger = BlockLogger::new(
            LoggingConfig {
                block_log_sinks: vec![],
                ..LoggingConfig::default()
            },
            vec![Box::new(sink)],
        );

        logger.log(BlockKind::Api, "https://a", "r1");
        logger.log(BlockKind::Dom, "element b", "r2");
        logger.log(BlockKind::Redirect, "https://c", "r3");

        // Allow time for async task to process
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let events: Vec<_> = buffer.read().unwrap().iter().cloned().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].target, "element b");
        assert_eq!(events[1].target, "https://c");
    }
}
