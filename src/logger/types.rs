use crate::stats::BlockKind;
use serde::Serialize;

/// One blocked candidate, as reported by any layer.
#[derive(Debug, Clone, Serialize)]
pub struct BlockEvent {
    /// Counter the block was folded into.
    pub layer: BlockKind,
    /// Blocked URL or element description, original case preserved.
    pub target: String,
    /// Label of the rule that matched.
    pub rule: &'static str,
    /// Unix seconds.
    pub at: u64,
}

pub trait BlockLogSink: Send + Sync {
    fn log(&self, event: &BlockEvent);
}
