//! The DOM removal layer: classifies inserted elements and detaches
//! short-form surfaces, with at-most-once processing per node
//! identity and a periodic compensating sweep.

use super::dom::{Document, MutationRecord, NodeId};
use super::{StateView, TaskHandle};
use crate::bus::StatsReporter;
use crate::engine::rules::{self, DomPredicate, DOM_RULES};
use crate::engine::{BlockCategory, BlockDecision};
use crate::error::EngineError;
use crate::logger::BlockLogger;
use crate::stats::BlockKind;
use moka::sync::Cache;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Classifies one element against the ordered DOM rules.
/// Chip/tab-textual first, then attributes, then tags, then anchors;
/// first hit wins.
pub fn classify_element(doc: &Document, id: NodeId) -> Result<Option<&'static str>, EngineError> {
    let Some(element) = doc.get(id) else {
        return Ok(None);
    };
    if element.tag.is_empty() {
        return Err(EngineError::classification(
            format!("node {id}"),
            "element has no tag name",
        ));
    }

    for rule in DOM_RULES {
        let hit = match &rule.predicate {
            DomPredicate::ChipText { tags, text } => {
                tags.contains(&element.tag.as_str())
                    && doc.text_content(id).trim().eq_ignore_ascii_case(text)
            }
            DomPredicate::Attribute { tag, name, value } => {
                tag.map_or(true, |tag| element.tag == tag)
                    && match element.attrs.get(*name) {
                        Some(actual) => value.map_or(true, |value| actual == value),
                        None => false,
                    }
            }
            DomPredicate::Tag(tag) => element.tag == *tag,
            DomPredicate::AnchorHref => {
                element.tag == "a"
                    && element
                        .attrs
                        .get("href")
                        .map(|href| rules::href_is_shorts(href))
                        .unwrap_or(false)
            }
        };
        if hit {
            return Ok(Some(rule.label));
        }
    }
    Ok(None)
}

/// Consumes mutation batches and periodically sweeps the live tree.
pub struct DomObserver {
    doc: Arc<Mutex<Document>>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
    /// Membership cache: at-most-once processing per node identity.
    /// Bounded with eviction instead of weak references; the capacity
    /// is a memory bound, not a correctness mechanism.
    seen: Cache<NodeId, ()>,
}

impl DomObserver {
    pub fn new(
        doc: Arc<Mutex<Document>>,
        view: Arc<StateView>,
        reporter: Arc<StatsReporter>,
        logger: Arc<BlockLogger>,
        cache_capacity: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            doc,
            view,
            reporter,
            logger,
            seen: Cache::new(cache_capacity),
        })
    }

    /// Runs the observation loop until stopped or the mutation channel
    /// closes. The sweep fires immediately on startup, covering
    /// elements present before observation began.
    pub fn spawn(
        self: &Arc<Self>,
        mut mutations: mpsc::UnboundedReceiver<MutationRecord>,
        sweep_every: Duration,
    ) -> TaskHandle {
        let observer = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut sweep = tokio::time::interval(sweep_every);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    record = mutations.recv() => match record {
                        Some(record) => observer.process_record(&record),
                        None => break,
                    },
                    _ = sweep.tick() => observer.sweep(),
                }
            }
        });
        TaskHandle::new(shutdown_tx, task)
    }

    /// Processes one mutation batch: every added node plus all of its
    /// descendants, since matches can sit several levels inside a
    /// single inserted subtree.
    pub fn process_record(&self, record: &MutationRecord) {
        let mut doc = self.doc.lock().unwrap();
        for &root in &record.added {
            let mut targets = vec![root];
            targets.extend(doc.descendants(root));
            for id in targets {
                // One malformed node never aborts its siblings.
                if let Err(e) = self.process_node(&mut doc, id) {
                    warn!("{e}");
                }
            }
        }
    }

    /// Re-scans the visible tree, compensating for mutations that
    /// raced observer attachment or were otherwise lost.
    pub fn sweep(&self) {
        let mut doc = self.doc.lock().unwrap();
        let targets = doc.descendants(doc.body());
        for id in targets {
            if let Err(e) = self.process_node(&mut doc, id) {
                warn!("{e}");
            }
        }
    }

    fn process_node(&self, doc: &mut Document, id: NodeId) -> Result<bool, EngineError> {
        if self.seen.contains_key(&id) {
            return Ok(false);
        }
        // An earlier match in this batch may have detached a whole
        // subtree this node sits in.
        if !doc.is_attached(id) {
            return Ok(false);
        }
        let Some(rule) = classify_element(doc, id)? else {
            return Ok(false);
        };
        let target = doc
            .get(id)
            .map(|element| format!("<{}>", element.tag))
            .unwrap_or_else(|| format!("node {id}"));
        let decision = BlockDecision::cancel(BlockCategory::DomElement, rule, &target);

        doc.detach(id);
        self.seen.insert(id, ());

        self.reporter
            .record_block(BlockKind::Dom, self.view.enabled());
        self.logger
            .log(BlockKind::Dom, &decision.target, decision.rule_label());
        Ok(true)
    }
}
