//! Block counters: lock-free per-context collectors, the persisted
//! aggregate snapshot, and the additive-merge delta that ties them
//! together across contexts.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which counter a blocked event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Canceled API request (network hook or page patch).
    Api,
    /// Removed DOM element.
    Dom,
    /// Navigation rescued back to the canonical home.
    Redirect,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Api => "api",
            BlockKind::Dom => "dom",
            BlockKind::Redirect => "redirect",
        }
    }
}

/// Aggregate counters as persisted and broadcast.
///
/// Invariant: `total == api_blocks + dom_blocks + redirect_blocks`
/// after every mutation. Counters only grow within a session; the one
/// exception is an explicit user reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub api_blocks: u64,
    #[serde(default)]
    pub dom_blocks: u64,
    #[serde(default)]
    pub redirect_blocks: u64,
    /// Unix seconds of the last mutation.
    #[serde(default)]
    pub last_updated: u64,
}

impl BlockStats {
    /// Folds a local delta in, recomputing `total` from its parts so
    /// the sum invariant holds even against a hand-edited store.
    pub fn merge(&mut self, delta: &StatsDelta) {
        self.api_blocks += delta.api;
        self.dom_blocks += delta.dom;
        self.redirect_blocks += delta.redirect;
        self.total = self.api_blocks + self.dom_blocks + self.redirect_blocks;
        self.last_updated = unix_now();
    }

    /// Zeroes every counter, stamping the reset time.
    pub fn reset(&mut self) {
        *self = BlockStats {
            last_updated: unix_now(),
            ..BlockStats::default()
        };
    }
}

/// One context's not-yet-persisted increments. Commutative and
/// associative under merge, so writer order never matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub api: u64,
    pub dom: u64,
    pub redirect: u64,
}

impl StatsDelta {
    pub fn single(kind: BlockKind) -> Self {
        let mut delta = StatsDelta::default();
        match kind {
            BlockKind::Api => delta.api = 1,
            BlockKind::Dom => delta.dom = 1,
            BlockKind::Redirect => delta.redirect = 1,
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.api == 0 && self.dom == 0 && self.redirect == 0
    }
}

/// Lock-free per-context counters. Increments are synchronous on the
/// interception hot path; draining happens on the persist path.
#[derive(Debug, Default)]
pub struct StatsCollector {
    api: AtomicU64,
    dom: AtomicU64,
    redirect: AtomicU64,
}

impl StatsCollector {
    pub fn record(&self, kind: BlockKind) {
        match kind {
            BlockKind::Api => self.api.fetch_add(1, Ordering::Relaxed),
            BlockKind::Dom => self.dom.fetch_add(1, Ordering::Relaxed),
            BlockKind::Redirect => self.redirect.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Takes everything recorded since the last drain, leaving zeros.
    pub fn drain(&self) -> StatsDelta {
        StatsDelta {
            api: self.api.swap(0, Ordering::Relaxed),
            dom: self.dom.swap(0, Ordering::Relaxed),
            redirect: self.redirect.swap(0, Ordering::Relaxed),
        }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Renders unix seconds as a `HH:MM:SS` UTC clock string for stats
/// replies.
pub fn format_clock(secs: u64) -> String {
    let of_day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_total_equal_to_sum_of_parts() {
        let mut stats = BlockStats::default();
        stats.merge(&StatsDelta {
            api: 2,
            dom: 3,
            redirect: 1,
        });
        stats.merge(&StatsDelta::single(BlockKind::Api));
        assert_eq!(stats.api_blocks, 3);
        assert_eq!(stats.dom_blocks, 3);
        assert_eq!(stats.redirect_blocks, 1);
        assert_eq!(
            stats.total,
            stats.api_blocks + stats.dom_blocks + stats.redirect_blocks
        );
        assert!(stats.last_updated > 0);
    }

    #[test]
    fn merge_is_additive_across_splits() {
        let mut split = BlockStats::default();
        split.merge(&StatsDelta {
            api: 1,
            dom: 0,
            redirect: 2,
        });
        split.merge(&StatsDelta {
            api: 4,
            dom: 1,
            redirect: 0,
        });

        let mut whole = BlockStats::default();
        whole.merge(&StatsDelta {
            api: 5,
            dom: 1,
            redirect: 2,
        });

        assert_eq!(split.total, whole.total);
        assert_eq!(split.api_blocks, whole.api_blocks);
    }

    #[test]
    fn reset_zeroes_counters() {
        let mut stats = BlockStats::default();
        stats.merge(&StatsDelta::single(BlockKind::Dom));
        stats.reset();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.dom_blocks, 0);
        assert!(stats.last_updated > 0);
    }

    #[test]
    fn collector_drain_leaves_zeros() {
        let collector = StatsCollector::default();
        collector.record(BlockKind::Api);
        collector.record(BlockKind::Api);
        collector.record(BlockKind::Redirect);
        let delta = collector.drain();
        assert_eq!(delta.api, 2);
        assert_eq!(delta.redirect, 1);
        assert!(collector.drain().is_empty());
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(86_400 + 3_661), "01:01:01");
    }

    #[test]
    fn missing_fields_deserialize_as_defaults() {
        let stats: BlockStats = serde_json::from_str("{\"total\":4}").unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.api_blocks, 0);
    }
}
