use crate::config::LoggingConfig;
use crate::logger::types::{BlockEvent, BlockLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }
}

impl BlockLogSink for ConsoleLogSink {
    fn log(&self, event: &BlockEvent) {
        if !self.config.enable {
            return;
        }

        if self.config.format == "json" {
            info!(
                target: "block_event",
                layer = event.layer.as_str(),
                rule = event.rule,
                target_url = %event.target,
                at = event.at,
            );
        } else {
            info!(
                "[{}] blocked {} (rule {})",
                event.layer.as_str(),
                event.target,
                event.rule
            );
        }
    }
}
