//! In-page network API interception.
//!
//! The page's network entry points are modeled as swappable primitive
//! slots. Install wraps each slot's current primitive in a classifying
//! decorator; restore reinstates the exact references captured at
//! install time. Exactly one decorator instance per primitive per
//! context, so install and restore are both idempotent.

use super::StateView;
use crate::bus::StatsReporter;
use crate::engine::classify_request;
use crate::logger::BlockLogger;
use crate::stats::BlockKind;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// A request as issued from page code.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    pub method: String,
    pub body: Option<Vec<u8>>,
}

impl PageRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            body: Some(body.into()),
        }
    }
}

/// What a primitive resolves with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl PageResponse {
    /// The synthetic payload blocked calls resolve with: shaped like a
    /// legitimate empty result so rendering code degrades to "nothing
    /// to show" instead of throwing.
    pub fn empty_contents() -> Self {
        let body = serde_json::json!({
            "contents": [],
            "estimatedResults": "0",
        });
        Self {
            status: 200,
            body: serde_json::to_vec(&body).expect("synthetic body serializes"),
        }
    }
}

/// Call-and-await network entry point (the page's fetch).
#[async_trait]
pub trait NetworkPrimitive: Send + Sync {
    async fn invoke(&self, request: PageRequest) -> PageResponse;
}

/// Completion callback for event-style primitives.
pub type Completion = Box<dyn FnOnce(PageResponse) + Send + 'static>;

/// Callback/event-style network entry point (the page's XHR).
pub trait CallbackPrimitive: Send + Sync {
    fn invoke(&self, request: PageRequest, on_complete: Completion);
}

/// The page's mutable fetch binding.
pub struct FetchSlot {
    current: ArcSwap<Arc<dyn NetworkPrimitive>>,
}

impl FetchSlot {
    pub fn new(primitive: Arc<dyn NetworkPrimitive>) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(primitive),
        })
    }

    pub fn current(&self) -> Arc<dyn NetworkPrimitive> {
        (**self.current.load()).clone()
    }

    fn replace(&self, primitive: Arc<dyn NetworkPrimitive>) {
        self.current.store(Arc::new(primitive));
    }

    /// Invokes whatever is currently bound, wrapper or original.
    pub async fn invoke(&self, request: PageRequest) -> PageResponse {
        self.current().invoke(request).await
    }
}

/// The page's mutable XHR binding.
pub struct XhrSlot {
    current: ArcSwap<Arc<dyn CallbackPrimitive>>,
}

impl XhrSlot {
    pub fn new(primitive: Arc<dyn CallbackPrimitive>) -> Arc<Self> {
        Arc::new(Self {
            current: ArcSwap::from_pointee(primitive),
        })
    }

    pub fn current(&self) -> Arc<dyn CallbackPrimitive> {
        (**self.current.load()).clone()
    }

    fn replace(&self, primitive: Arc<dyn CallbackPrimitive>) {
        self.current.store(Arc::new(primitive));
    }

    pub fn invoke(&self, request: PageRequest, on_complete: Completion) {
        self.current().invoke(request, on_complete)
    }
}

/// Decorator applying the shared request classifier in front of an
/// await-style primitive.
struct ClassifyingDecorator {
    inner: Arc<dyn NetworkPrimitive>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
}

#[async_trait]
impl NetworkPrimitive for ClassifyingDecorator {
    async fn invoke(&self, request: PageRequest) -> PageResponse {
        if self.view.enabled() {
            let decision = classify_request(&request.url, request.body.as_deref()).into_substitute();
            if decision.is_block() {
                self.reporter.record_block(BlockKind::Api, true);
                self.logger
                    .log(BlockKind::Api, &request.url, decision.rule_label());
                // Resolve, never reject: a rejection surfaces
                // user-visible errors in the page.
                return PageResponse::empty_contents();
            }
        }
        // Delegate with the request forwarded unchanged.
        self.inner.invoke(request).await
    }
}

/// Decorator for the callback-style primitive. Blocked calls suppress
/// the real network call and complete asynchronously, preserving the
/// caller's expectation of async completion order.
struct ClassifyingCallbackDecorator {
    inner: Arc<dyn CallbackPrimitive>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
}

impl CallbackPrimitive for ClassifyingCallbackDecorator {
    fn invoke(&self, request: PageRequest, on_complete: Completion) {
        if self.view.enabled() {
            let decision = classify_request(&request.url, request.body.as_deref()).into_substitute();
            if decision.is_block() {
                self.reporter.record_block(BlockKind::Api, true);
                self.logger
                    .log(BlockKind::Api, &request.url, decision.rule_label());
                tokio::spawn(async move {
                    on_complete(PageResponse::empty_contents());
                });
                return;
            }
        }
        self.inner.invoke(request, on_complete)
    }
}

struct Originals {
    fetch: Arc<dyn NetworkPrimitive>,
    xhr: Arc<dyn CallbackPrimitive>,
}

/// Install/restore bookkeeping for both primitive slots.
pub struct ApiPatch {
    fetch: Arc<FetchSlot>,
    xhr: Arc<XhrSlot>,
    view: Arc<StateView>,
    reporter: Arc<StatsReporter>,
    logger: Arc<BlockLogger>,
    originals: Mutex<Option<Originals>>,
}

impl ApiPatch {
    pub fn new(
        fetch: Arc<FetchSlot>,
        xhr: Arc<XhrSlot>,
        view: Arc<StateView>,
        reporter: Arc<StatsReporter>,
        logger: Arc<BlockLogger>,
    ) -> Self {
        Self {
            fetch,
            xhr,
            view,
            reporter,
            logger,
            originals: Mutex::new(None),
        }
    }

    /// Wraps both primitives. Repeated calls do not double-wrap.
    pub fn install(&self) {
        let mut originals = self.originals.lock().unwrap();
        if originals.is_some() {
            return;
        }
        let fetch = self.fetch.current();
        let xhr = self.xhr.current();

        self.fetch.replace(Arc::new(ClassifyingDecorator {
            inner: fetch.clone(),
            view: self.view.clone(),
            reporter: self.reporter.clone(),
            logger: self.logger.clone(),
        }));
        self.xhr.replace(Arc::new(ClassifyingCallbackDecorator {
            inner: xhr.clone(),
            view: self.view.clone(),
            reporter: self.reporter.clone(),
            logger: self.logger.clone(),
        }));
        *originals = Some(Originals { fetch, xhr });
    }

    /// Reinstates the exact primitive references captured at install
    /// time. A no-op when nothing is installed.
    pub fn restore(&self) {
        if let Some(originals) = self.originals.lock().unwrap().take() {
            self.fetch.replace(originals.fetch);
            self.xhr.replace(originals.xhr);
        }
    }
}
