//! The privileged network-layer context.
//!
//! Observes outgoing requests before dispatch through the host's
//! before-send hook, owns the authoritative enabled flag, and answers
//! the cross-context control channel. Runs independently of the page
//! context: the two layers are redundant, not sequenced.

mod types;

pub use types::{HookDecision, RequestInfo, ResourceType};

use crate::bus::{publish, Ack, ControlRequest, StatsReply, StatsReporter, StatsUpdate};
use crate::engine::rules;
use crate::engine::{classify_request, BlockingState};
use crate::logger::BlockLogger;
use crate::stats::BlockKind;
use crate::store::{self, StateStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Before-send hook surface the host calls for every outgoing request
/// inside the registered scope.
#[async_trait]
pub trait BeforeRequestHook: Send + Sync {
    async fn on_before_request(&self, request: &RequestInfo) -> HookDecision;
}

/// Classifies requests before dispatch and coordinates state across
/// contexts.
#[derive(Clone)]
pub struct NetworkInterceptor {
    state: BlockingState,
    store: Arc<dyn StateStore>,
    reporter: Arc<StatsReporter>,
    updates: broadcast::Sender<StatsUpdate>,
    logger: Arc<BlockLogger>,
    home_url: String,
}

impl NetworkInterceptor {
    /// Builds the interceptor, cold-starting the enabled flag from the
    /// durable store. An empty or unreadable store means Active.
    pub async fn connect(
        store: Arc<dyn StateStore>,
        updates: broadcast::Sender<StatsUpdate>,
        logger: Arc<BlockLogger>,
        home_url: String,
    ) -> Self {
        let enabled = store::load_state(store.as_ref()).await;
        info!(
            "interceptor starting, blocking {}",
            if enabled { "active" } else { "paused" }
        );
        Self {
            state: BlockingState::new(enabled),
            reporter: StatsReporter::new(store.clone(), updates.clone()),
            store,
            updates,
            logger,
            home_url,
        }
    }

    pub fn state(&self) -> &BlockingState {
        &self.state
    }

    fn report(&self, kind: BlockKind, target: &str, rule: &'static str) {
        self.reporter.record_block(kind, self.state.is_enabled());
        self.logger.log(kind, target, rule);
    }

    /// Answers control messages until the channel closes. State
    /// mutations persist before broadcasting, so an observer that
    /// misses the notify still reads the right state on its next pull.
    pub async fn run_control_loop(self: Arc<Self>, mut control: mpsc::Receiver<ControlRequest>) {
        while let Some(request) = control.recv().await {
            match request {
                ControlRequest::GetStats { respond_to } => {
                    let stats = store::load_stats(self.store.as_ref()).await;
                    let _ =
                        respond_to.send(StatsReply::from_parts(&stats, self.state.is_enabled()));
                }
                ControlRequest::ResetStats { respond_to } => {
                    let success = match store::reset_stats(self.store.as_ref()).await {
                        Ok(stats) => {
                            let _ = publish(
                                &self.updates,
                                StatsUpdate {
                                    stats,
                                    enabled: self.state.is_enabled(),
                                },
                            );
                            true
                        }
                        Err(e) => {
                            tracing::warn!("stats reset failed: {e}");
                            false
                        }
                    };
                    let _ = respond_to.send(Ack { success });
                }
                ControlRequest::Toggle { respond_to } => {
                    let enabled = self.state.toggle();
                    info!(
                        "blocking toggled {}",
                        if enabled { "active" } else { "paused" }
                    );
                    // Persist first, notify second.
                    let success = match store::save_state(self.store.as_ref(), enabled).await {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!("state persist failed: {e}");
                            false
                        }
                    };
                    let stats = store::load_stats(self.store.as_ref()).await;
                    let _ = publish(&self.updates, StatsUpdate { stats, enabled });
                    let _ = respond_to.send(Ack { success });
                }
            }
        }
    }
}

#[async_trait]
impl BeforeRequestHook for NetworkInterceptor {
    async fn on_before_request(&self, request: &RequestInfo) -> HookDecision {
        // Registration scope: platform hosts, top-level documents and
        // XHR-class sub-resources only.
        if request.resource_type == ResourceType::Other || !rules::in_scope(&request.url) {
            return HookDecision::NoDecision;
        }

        // The hook stays installed while paused; the flag is checked
        // per call so toggling never races hook registration.
        if !self.state.is_enabled() {
            return HookDecision::NoDecision;
        }

        // 1. Top-level navigation: redirect instead of cancel.
        if request.resource_type == ResourceType::MainFrame {
            if rules::is_shorts_navigation(&request.url) {
                debug!("redirecting navigation away from {}", request.url);
                self.report(BlockKind::Redirect, &request.url, "shorts-navigation");
                return HookDecision::RedirectTo(self.home_url.clone());
            }
            return HookDecision::NoDecision;
        }

        // 2. Sub-resource API interception: canceling is safe, the
        //    page's own error handling degrades gracefully.
        let decision = classify_request(&request.url, request.body.as_deref());
        if decision.is_block() {
            debug!("canceling request to {}", request.url);
            self.report(BlockKind::Api, &request.url, decision.rule_label());
            return HookDecision::Cancel;
        }

        HookDecision::NoDecision
    }
}
