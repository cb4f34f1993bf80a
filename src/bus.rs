//! Cross-context messaging: the control channel the interceptor
//! answers, the fire-and-forget stats broadcast, and the per-context
//! block reporter that ties counters, store, and broadcast together.
//!
//! All payloads are flat records of primitive fields.

use crate::error::EngineError;
use crate::stats::{format_clock, BlockKind, BlockStats, StatsCollector};
use crate::store::{merge_stats, StateStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

const CONTROL_BUFFER: usize = 32;
const BROADCAST_BUFFER: usize = 64;

/// Reply to `GET_STATS`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReply {
    pub total: u64,
    pub api_blocks: u64,
    pub dom_blocks: u64,
    pub redirect_blocks: u64,
    pub enabled: bool,
    /// Wall-clock `HH:MM:SS` (UTC) of the last counter mutation.
    pub last_updated: String,
}

impl StatsReply {
    pub fn from_parts(stats: &BlockStats, enabled: bool) -> Self {
        Self {
            total: stats.total,
            api_blocks: stats.api_blocks,
            dom_blocks: stats.dom_blocks,
            redirect_blocks: stats.redirect_blocks,
            enabled,
            last_updated: format_clock(stats.last_updated),
        }
    }
}

/// Acknowledgment for state-changing commands.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ack {
    pub success: bool,
}

/// Commands a UI observer or the page context sends to the
/// interceptor. Every command is answered asynchronously through its
/// reply envelope.
#[derive(Debug)]
pub enum ControlRequest {
    GetStats {
        respond_to: oneshot::Sender<StatsReply>,
    },
    ResetStats {
        respond_to: oneshot::Sender<Ack>,
    },
    Toggle {
        respond_to: oneshot::Sender<Ack>,
    },
}

/// Broadcast pushed opportunistically after every counter or state
/// mutation. No response is expected.
#[derive(Debug, Clone, Serialize)]
pub struct StatsUpdate {
    pub stats: BlockStats,
    pub enabled: bool,
}

/// Sender half of the control channel, handed to UI observers and the
/// page context.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    pub async fn get_stats(&self) -> Option<StatsReply> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::GetStats { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn reset_stats(&self) -> Option<Ack> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::ResetStats { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn toggle(&self) -> Option<Ack> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::Toggle { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }
}

/// Creates the control channel pair. The receiver goes to the
/// interceptor's control loop.
pub fn control_channel() -> (ControlHandle, mpsc::Receiver<ControlRequest>) {
    let (tx, rx) = mpsc::channel(CONTROL_BUFFER);
    (ControlHandle { tx }, rx)
}

/// Creates the stats broadcast channel. Subscribe for updates via
/// `Sender::subscribe`.
pub fn stats_channel() -> broadcast::Sender<StatsUpdate> {
    broadcast::channel(BROADCAST_BUFFER).0
}

/// Best-effort push. Callers ignore the delivery error: a missing
/// listener just means the UI is closed right now.
pub fn publish(
    updates: &broadcast::Sender<StatsUpdate>,
    update: StatsUpdate,
) -> Result<(), EngineError> {
    updates
        .send(update)
        .map(|_receivers| ())
        .map_err(|_| EngineError::Delivery)
}

/// Per-context block accounting.
///
/// `record_block` does the three things every blocked event needs:
/// a synchronous local counter increment, a fire-and-forget additive
/// merge into the durable store, and a best-effort broadcast of the
/// merged result. A failed persist is logged and abandoned; the loss
/// is bounded by the next successful write.
pub struct StatsReporter {
    local: StatsCollector,
    store: Arc<dyn StateStore>,
    updates: broadcast::Sender<StatsUpdate>,
}

impl StatsReporter {
    pub fn new(store: Arc<dyn StateStore>, updates: broadcast::Sender<StatsUpdate>) -> Arc<Self> {
        Arc::new(Self {
            local: StatsCollector::default(),
            store,
            updates,
        })
    }

    /// `enabled` is the caller's view of the master switch, carried in
    /// the broadcast payload for UI convenience.
    pub fn record_block(self: &Arc<Self>, kind: BlockKind, enabled: bool) {
        self.local.record(kind);
        let delta = self.local.drain();
        if delta.is_empty() {
            // A concurrent drain already picked this increment up.
            return;
        }

        let reporter = self.clone();
        tokio::spawn(async move {
            match merge_stats(reporter.store.as_ref(), &delta).await {
                Ok(merged) => {
                    let _ = publish(
                        &reporter.updates,
                        StatsUpdate {
                            stats: merged,
                            enabled,
                        },
                    );
                }
                Err(e) => warn!("stats persist failed, dropping delta: {e}"),
            }
        });
    }
}
