//! Initialization helpers for daemon startup.

use crate::config::Config;
use crate::logger::{BlockEvent, BlockLogger, BlockLogSink, MemoryLogSink};
use crate::store::{MemoryStore, SqliteStore, StateStore};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Opens the durable store named by the config.
///
/// A store that fails to open degrades to the in-memory backend
/// rather than aborting: losing persistence costs counter history,
/// never blocking behavior.
pub fn init_store(config: &Config) -> Arc<dyn StateStore> {
    match config.store.backend.as_str() {
        "memory" => {
            info!("using in-memory store (counters reset on restart)");
            Arc::new(MemoryStore::new())
        }
        "sqlite" => match SqliteStore::open(&config.store.path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("sqlite store unavailable, falling back to memory: {e}");
                Arc::new(MemoryStore::new())
            }
        },
        other => {
            warn!("unknown store backend '{other}', falling back to memory");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Builds the block-event logger plus the shared ring buffer the API
/// serves recent events from.
#[allow(clippy::type_complexity)]
pub fn init_block_logger(
    config: &Config,
) -> (Arc<BlockLogger>, Arc<RwLock<VecDeque<BlockEvent>>>) {
    let memory_sink = MemoryLogSink::new(config.logging.memory_log_capacity);
    let buffer = memory_sink.clone_buffer();
    let extra_sinks: Vec<Box<dyn BlockLogSink>> = vec![Box::new(memory_sink)];
    let logger = BlockLogger::new(config.logging.clone(), extra_sinks);
    (logger, buffer)
}
