//! The durable key-value store shared across contexts.
//!
//! Two logical records: `state` (the enabled flag) and `stats` (the
//! aggregate counters), both JSON documents with last-write-wins
//! semantics per key. A missing or unreadable record reads as its
//! default; stats writers always go through the additive merge here,
//! never a raw overwrite.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::EngineError;
use crate::stats::{unix_now, BlockStats, StatsDelta};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Logical key for the enabled flag record.
pub const STATE_KEY: &str = "state";
/// Logical key for the aggregate counters record.
pub const STATS_KEY: &str = "stats";

/// A persisted key-value mapping surviving restarts, shared by key
/// across contexts but never by memory.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), EngineError>;
}

/// Persisted form of the enabled flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PersistedState {
    pub enabled: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Loads the enabled flag. An empty or unreadable store defaults to
/// Active: failing open here only means blocking stays on.
pub async fn load_state(store: &dyn StateStore) -> bool {
    match store.get(STATE_KEY).await {
        Ok(Some(raw)) => serde_json::from_str::<PersistedState>(&raw)
            .map(|state| state.enabled)
            .unwrap_or_else(|e| {
                warn!("unreadable state record, defaulting to active: {e}");
                true
            }),
        Ok(None) => true,
        Err(e) => {
            warn!("state load failed, defaulting to active: {e}");
            true
        }
    }
}

pub async fn save_state(store: &dyn StateStore, enabled: bool) -> Result<(), EngineError> {
    let raw = serde_json::to_string(&PersistedState { enabled }).expect("state serializes");
    store.put(STATE_KEY, &raw).await
}

/// Loads the aggregate counters, tolerating a missing or unreadable
/// record as zeroes.
pub async fn load_stats(store: &dyn StateStore) -> BlockStats {
    match store.get(STATS_KEY).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("unreadable stats record, starting from zero: {e}");
            BlockStats::default()
        }),
        Ok(None) => BlockStats::default(),
        Err(e) => {
            warn!("stats load failed, starting from zero: {e}");
            BlockStats::default()
        }
    }
}

pub async fn save_stats(store: &dyn StateStore, stats: &BlockStats) -> Result<(), EngineError> {
    let raw = serde_json::to_string(stats).expect("stats serialize");
    store.put(STATS_KEY, &raw).await
}

/// Read-modify-write additive merge of one context's delta.
///
/// Concurrent writers from different contexts may race on the read;
/// the occasional lost increment under true concurrency is an
/// accepted, bounded inaccuracy. There is no lock to take instead.
pub async fn merge_stats(
    store: &dyn StateStore,
    delta: &StatsDelta,
) -> Result<BlockStats, EngineError> {
    let mut current = load_stats(store).await;
    current.merge(delta);
    save_stats(store, &current).await?;
    Ok(current)
}

/// Zeroes the persisted counters. The only non-additive stats write,
/// reserved for the explicit user reset command.
pub async fn reset_stats(store: &dyn StateStore) -> Result<BlockStats, EngineError> {
    let stats = BlockStats {
        last_updated: unix_now(),
        ..BlockStats::default()
    };
    save_stats(store, &stats).await?;
    Ok(stats)
}
