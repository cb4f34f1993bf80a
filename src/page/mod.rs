//! The page-embedded context.
//!
//! Everything here runs where the network interceptor has no
//! visibility: the page's own fetch/XHR calls, already-rendered DOM
//! nodes, clicks, and client-side route changes. The whole layer set
//! activates and deactivates as one on broadcast state changes; the
//! cached state here is read-through only, never written directly.

pub mod api_patch;
pub mod dom;
pub mod nav;
pub mod observer;

pub use api_patch::{ApiPatch, FetchSlot, PageRequest, PageResponse, XhrSlot};
pub use dom::{Document, MutationRecord, NodeId};
pub use nav::{ClickEvent, ClickGuard, ClickOutcome, HistoryWatcher, WindowLocation};
pub use observer::DomObserver;

use crate::bus::{ControlHandle, StatsReporter, StatsUpdate};
use crate::config::PageConfig;
use crate::logger::BlockLogger;
use crate::stats::BlockStats;
use crate::store::StateStore;
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Read-through cached copy of the interceptor's state, refreshed
/// from broadcasts and an initial pull.
pub struct StateView {
    current: ArcSwap<StatsUpdate>,
}

impl StateView {
    pub fn new(initial: StatsUpdate) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(initial),
        })
    }

    pub fn enabled(&self) -> bool {
        self.current.load().enabled
    }

    pub fn stats(&self) -> BlockStats {
        self.current.load().stats.clone()
    }

    pub fn refresh(&self, update: StatsUpdate) {
        self.current.store(Arc::new(update));
    }
}

/// A spawned context task with deterministic disposal.
pub struct TaskHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TaskHandle {
    pub fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self { shutdown, task }
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

/// What the host hands the page context at startup.
pub struct PageHost {
    pub doc: Arc<Mutex<Document>>,
    pub window: Arc<WindowLocation>,
    pub fetch: Arc<FetchSlot>,
    pub xhr: Arc<XhrSlot>,
    /// History-API navigation events, one URL per client-side change.
    pub history_urls: mpsc::UnboundedReceiver<String>,
}

/// The page context: owns the API patch, the DOM observer, and the
/// navigation guards.
pub struct PagePatcher {
    doc: Arc<Mutex<Document>>,
    view: Arc<StateView>,
    api_patch: ApiPatch,
    click_guard: Arc<ClickGuard>,
    history: Arc<HistoryWatcher>,
    observer: Arc<DomObserver>,
    sweep_every: Duration,
    active: tokio::sync::Mutex<Option<TaskHandle>>,
}

impl PagePatcher {
    /// Wires the page context up and starts its event loops. Pulls the
    /// initial state from the interceptor before activating anything;
    /// an unanswered pull behaves like a cold start (blocking active).
    pub async fn connect(
        host: PageHost,
        control: &ControlHandle,
        updates: broadcast::Sender<StatsUpdate>,
        store: Arc<dyn StateStore>,
        logger: Arc<BlockLogger>,
        config: &PageConfig,
        home_url: String,
    ) -> Arc<Self> {
        let initial = match control.get_stats().await {
            Some(reply) => StatsUpdate {
                stats: BlockStats {
                    total: reply.total,
                    api_blocks: reply.api_blocks,
                    dom_blocks: reply.dom_blocks,
                    redirect_blocks: reply.redirect_blocks,
                    last_updated: 0,
                },
                enabled: reply.enabled,
            },
            None => StatsUpdate {
                stats: BlockStats::default(),
                enabled: true,
            },
        };

        let listener = updates.subscribe();
        let view = StateView::new(initial.clone());
        let reporter = StatsReporter::new(store, updates);

        let api_patch = ApiPatch::new(
            host.fetch,
            host.xhr,
            view.clone(),
            reporter.clone(),
            logger.clone(),
        );
        let click_guard = ClickGuard::new(
            host.doc.clone(),
            host.window.clone(),
            view.clone(),
            reporter.clone(),
            logger.clone(),
            home_url.clone(),
            config.max_click_ancestor_hops,
        );
        let history = HistoryWatcher::new(
            host.window,
            view.clone(),
            reporter.clone(),
            logger.clone(),
            home_url,
        );
        let observer = DomObserver::new(
            host.doc.clone(),
            view.clone(),
            reporter,
            logger,
            config.membership_cache_capacity,
        );

        let patcher = Arc::new(Self {
            doc: host.doc,
            view,
            api_patch,
            click_guard,
            history,
            observer,
            sweep_every: Duration::from_secs(config.sweep_interval_secs.max(1)),
            active: tokio::sync::Mutex::new(None),
        });

        if initial.enabled {
            patcher.activate().await;
        }

        // The watcher's event feed outlives activate/deactivate
        // cycles; the installed flag decides whether events act.
        let history = patcher.history.clone();
        let mut history_urls = host.history_urls;
        tokio::spawn(async move {
            while let Some(url) = history_urls.recv().await {
                history.on_url_change(&url);
            }
        });

        tokio::spawn(patcher.clone().run(listener));
        patcher
    }

    pub fn view(&self) -> &Arc<StateView> {
        &self.view
    }

    /// Host entry point for capture-phase clicks.
    pub fn on_click(&self, event: ClickEvent) -> ClickOutcome {
        self.click_guard.on_click(event)
    }

    /// Installs every page-side layer. Idempotent.
    pub async fn activate(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return;
        }
        self.api_patch.install();
        self.click_guard.install();
        self.history.install();
        let mutations = self.doc.lock().unwrap().observe();
        *active = Some(self.observer.spawn(mutations, self.sweep_every));
        info!("page blocking layers active");
    }

    /// Restores the original primitives and disposes of every
    /// listener and timer. Idempotent.
    pub async fn deactivate(&self) {
        let mut active = self.active.lock().await;
        let Some(handle) = active.take() else {
            return;
        };
        self.api_patch.restore();
        self.click_guard.uninstall();
        self.history.uninstall();
        handle.stop().await;
        info!("page blocking layers inactive");
    }

    /// Follows broadcasts: refreshes the cached view and keeps the
    /// layer set in line with the master switch.
    async fn run(self: Arc<Self>, mut updates: broadcast::Receiver<StatsUpdate>) {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    let enabled = update.enabled;
                    self.view.refresh(update);
                    if enabled {
                        self.activate().await;
                    } else {
                        self.deactivate().await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{control_channel, stats_channel};
    use crate::engine::rules;
    use crate::interceptor::NetworkInterceptor;
    use crate::store::MemoryStore;

    async fn engine_parts() -> (
        ControlHandle,
        broadcast::Sender<StatsUpdate>,
        Arc<dyn StateStore>,
    ) {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let updates = stats_channel();
        let (control, control_rx) = control_channel();
        let interceptor = Arc::new(
            NetworkInterceptor::connect(
                store.clone(),
                updates.clone(),
                BlockLogger::disabled(),
                rules::CANONICAL_HOME_URL.to_string(),
            )
            .await,
        );
        tokio::spawn(interceptor.run_control_loop(control_rx));
        (control, updates, store)
    }

    struct NoopPrimitive;

    #[async_trait::async_trait]
    impl api_patch::NetworkPrimitive for NoopPrimitive {
        async fn invoke(&self, _request: PageRequest) -> PageResponse {
            PageResponse {
                status: 200,
                body: Vec::new(),
            }
        }
    }

    impl api_patch::CallbackPrimitive for NoopPrimitive {
        fn invoke(&self, _request: PageRequest, on_complete: api_patch::Completion) {
            on_complete(PageResponse {
                status: 200,
                body: Vec::new(),
            });
        }
    }

    fn page_host() -> (PageHost, Arc<FetchSlot>, mpsc::UnboundedSender<String>) {
        let (history_tx, history_rx) = mpsc::unbounded_channel();
        let fetch = FetchSlot::new(Arc::new(NoopPrimitive));
        let host = PageHost {
            doc: Document::shared(),
            window: WindowLocation::new("https://www.youtube.com/"),
            fetch: fetch.clone(),
            xhr: XhrSlot::new(Arc::new(NoopPrimitive)),
            history_urls: history_rx,
        };
        (host, fetch, history_tx)
    }

    #[tokio::test]
    async fn toggle_deactivates_and_reactivates_layers() {
        let (control, updates, store) = engine_parts().await;
        let (host, fetch, _history_tx) = page_host();
        let original = fetch.current();

        let patcher = PagePatcher::connect(
            host,
            &control,
            updates,
            store,
            BlockLogger::disabled(),
            &PageConfig::default(),
            rules::CANONICAL_HOME_URL.to_string(),
        )
        .await;

        // Connected while enabled: primitives are wrapped.
        assert!(!Arc::ptr_eq(&fetch.current(), &original));

        control.toggle().await.unwrap();
        for _ in 0..50 {
            if Arc::ptr_eq(&fetch.current(), &original) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(Arc::ptr_eq(&fetch.current(), &original));
        assert!(!patcher.view().enabled());

        control.toggle().await.unwrap();
        for _ in 0..50 {
            if !Arc::ptr_eq(&fetch.current(), &original) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!Arc::ptr_eq(&fetch.current(), &original));
        assert!(patcher.view().enabled());
    }

    #[tokio::test]
    async fn connect_respects_paused_initial_state() {
        let (control, updates, store) = engine_parts().await;
        control.toggle().await.unwrap();

        let (host, fetch, _history_tx) = page_host();
        let original = fetch.current();
        let patcher = PagePatcher::connect(
            host,
            &control,
            updates,
            store,
            BlockLogger::disabled(),
            &PageConfig::default(),
            rules::CANONICAL_HOME_URL.to_string(),
        )
        .await;

        assert!(!patcher.view().enabled());
        assert!(Arc::ptr_eq(&fetch.current(), &original));
    }
}
