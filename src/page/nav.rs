//! Click and SPA-navigation interception.
//!
//! The last line of defense for navigations that slipped past DOM
//! removal: a capture-phase click guard and a history-API watcher.
//! Client-side route changes never produce a full page load, so the
//! network hook cannot see them; this layer can.

use super::dom::{Document, NodeId};
use super::StateView;
use crate::bus::StatsReporter;
use crate::engine::{classify_click, classify_spa_navigation, BlockAction};
use crate::logger::BlockLogger;
use crate::stats::BlockKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Minimal stand-in for the window location the guards redirect.
#[derive(Debug)]
pub struct WindowLocation {
    current: Mutex<String>,
}

impl WindowLocation {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(url.to_string()),
        })
    }

    pub fn navigate(&self, url: &str) {
        *self.current.lock().unwrap() = url.to_string();
    }

    pub fn current(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

/// A user click delivered by the host's capture-phase listener.
#[derive(Debug, Clone, Copy)]
pub struct ClickEvent {
    pub target: NodeId,
}

/// Outcome of the capture-phase handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Event untouched; default navigation proceeds.
    PassThrough,
    /// Default prevented, propagation stopped, window redirected home.
    Consumed,
}

/// Walks up from the click target looking for a short-form anchor.
pub struct ClickGuard {
    doc: Arc<Mutex<Document>>,
    window: Arc<WindowLocation>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
    home_url: String,
    max_hops: usize,
    installed: AtomicBool,
}

impl ClickGuard {
    pub fn new(
        doc: Arc<Mutex<Document>>,
        window: Arc<WindowLocation>,
        view: Arc<StateView>,
        reporter: Arc<StatsReporter>,
        logger: Arc<BlockLogger>,
        home_url: String,
        max_hops: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            doc,
            window,
            view,
            reporter,
            logger,
            home_url,
            max_hops,
            installed: AtomicBool::new(false),
        })
    }

    pub fn install(&self) {
        self.installed.store(true, Ordering::Relaxed);
    }

    pub fn uninstall(&self) {
        self.installed.store(false, Ordering::Relaxed);
    }

    /// Capture-phase handler. The ancestor walk is bounded: it runs
    /// on every click, ahead of the page's own handlers.
    pub fn on_click(&self, event: ClickEvent) -> ClickOutcome {
        if !self.installed.load(Ordering::Relaxed) || !self.view.enabled() {
            return ClickOutcome::PassThrough;
        }

        let decision = {
            let doc = self.doc.lock().unwrap();
            let mut current = Some(event.target);
            let mut found = None;
            for _ in 0..=self.max_hops {
                let Some(id) = current else { break };
                if id == doc.body() {
                    break;
                }
                let Some(element) = doc.get(id) else { break };
                if element.tag == "a" {
                    if let Some(href) = element.attrs.get("href") {
                        let decision = classify_click(href, &self.home_url);
                        if decision.is_block() {
                            found = Some(decision);
                            break;
                        }
                    }
                }
                current = element.parent;
            }
            found
        };

        match decision {
            Some(decision) => {
                if let BlockAction::Redirect(to) = &decision.action {
                    debug!("consuming click into {}", decision.target);
                    self.window.navigate(to);
                }
                self.reporter
                    .record_block(BlockKind::Redirect, self.view.enabled());
                self.logger
                    .log(BlockKind::Redirect, &decision.target, decision.rule_label());
                ClickOutcome::Consumed
            }
            None => ClickOutcome::PassThrough,
        }
    }
}

/// Watches history-API navigation and forces the window back to the
/// canonical home when the route enters short-form content.
pub struct HistoryWatcher {
    window: Arc<WindowLocation>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
    home_url: String,
    installed: AtomicBool,
}

impl HistoryWatcher {
    pub fn new(
        window: Arc<WindowLocation>,
        view: Arc<StateView>,
        reporter: Arc<StatsReporter>,
        logger: Arc<BlockLogger>,
        home_url: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            window,
            view,
            reporter,
            logger,
            home_url,
            installed: AtomicBool::new(false),
        })
    }

    pub fn install(&self) {
        self.installed.store(true, Ordering::Relaxed);
    }

    pub fn uninstall(&self) {
        self.installed.store(false, Ordering::Relaxed);
    }

    pub fn on_url_change(&self, url: &str) {
        if !self.installed.load(Ordering::Relaxed) || !self.view.enabled() {
            return;
        }
        let decision = classify_spa_navigation(url, &self.home_url);
        if let BlockAction::Redirect(to) = &decision.action {
            debug!("rescuing client-side navigation away from {url}");
            self.window.navigate(to);
            self.reporter
                .record_block(BlockKind::Redirect, self.view.enabled());
            self.logger
                .log(BlockKind::Redirect, url, decision.rule_label());
        }
    }
}
