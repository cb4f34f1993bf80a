//! The page context wired against a live interceptor: mutation-driven
//! removal, API patching, and navigation guards reacting to toggles.

use reel_nope::bus::{self, ControlHandle, StatsUpdate};
use reel_nope::config::PageConfig;
use reel_nope::engine::rules;
use reel_nope::interceptor::NetworkInterceptor;
use reel_nope::logger::BlockLogger;
use reel_nope::page::{
    api_patch::{CallbackPrimitive, Completion, NetworkPrimitive},
    ClickEvent, ClickOutcome, Document, FetchSlot, PageHost, PagePatcher, PageRequest,
    PageResponse, WindowLocation, XhrSlot,
};
use reel_nope::store::{self, MemoryStore, StateStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

struct StubPrimitive;

#[async_trait::async_trait]
impl NetworkPrimitive for StubPrimitive {
    async fn invoke(&self, _request: PageRequest) -> PageResponse {
        PageResponse {
            status: 200,
            body: b"real".to_vec(),
        }
    }
}

impl CallbackPrimitive for StubPrimitive {
    fn invoke(&self, _request: PageRequest, on_complete: Completion) {
        on_complete(PageResponse {
            status: 200,
            body: b"real".to_vec(),
        });
    }
}

struct Harness {
    control: ControlHandle,
    store: Arc<dyn StateStore>,
    doc: Arc<Mutex<Document>>,
    window: Arc<WindowLocation>,
    fetch: Arc<FetchSlot>,
    history_tx: mpsc::UnboundedSender<String>,
    patcher: Arc<PagePatcher>,
}

async fn spawn_harness(sweep_interval_secs: u64) -> Harness {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let updates: broadcast::Sender<StatsUpdate> = bus::stats_channel();
    let (control, control_rx) = bus::control_channel();

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

    let doc = Document::shared();
    let window = WindowLocation::new("https://www.youtube.com/feed/subscriptions");
    let fetch = FetchSlot::new(Arc::new(StubPrimitive));
    let xhr = XhrSlot::new(Arc::new(StubPrimitive));
    let (history_tx, history_rx) = mpsc::unbounded_channel();

    let host = PageHost {
        doc: doc.clone(),
        window: window.clone(),
        fetch: fetch.clone(),
        xhr,
        history_urls: history_rx,
    };

    let config = PageConfig {
        sweep_interval_secs,
        ..PageConfig::default()
    };
    let patcher = PagePatcher::connect(
        host,
        &control,
        updates,
        store.clone(),
        BlockLogger::disabled(),
        &config,
        rules::CANONICAL_HOME_URL.to_string(),
    )
    .await;

    Harness {
        control,
        store,
        doc,
        window,
        fetch,
        history_tx,
        patcher,
    }
}

async fn wait_for<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn wait_for_dom_blocks(store: &dyn StateStore, expected: u64) {
    for _ in 0..200 {
        if store::load_stats(store).await.dom_blocks == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dom blocks never reached {expected}");
}

#[tokio::test]
async fn inserted_shelf_is_removed_through_the_live_observer() {
    let harness = spawn_harness(3600).await;

    let shelf = {
        let mut doc = harness.doc.lock().unwrap();
        let shelf = doc.create_element("ytd-reel-shelf-renderer");
        let body = doc.body();
        doc.append_child(body, shelf);
        shelf
    };

    let doc = harness.doc.clone();
    wait_for("shelf removal", move || {
        !doc.lock().unwrap().is_attached(shelf)
    })
    .await;
    wait_for_dom_blocks(harness.store.as_ref(), 1).await;

    let reply = harness.control.get_stats().await.unwrap();
    assert_eq!(reply.dom_blocks, 1);
    assert_eq!(reply.total, 1);
}

#[tokio::test]
async fn sweep_compensates_for_insertions_the_observer_never_saw() {
    let harness = spawn_harness(1).await;

    // Pause: the observer subscription is disposed of.
    harness.control.toggle().await.unwrap();
    let patcher = harness.patcher.clone();
    wait_for("page layers paused", move || !patcher.view().enabled()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // This insertion produces no mutation record anyone is listening
    // to.
    let anchor = {
        let mut doc = harness.doc.lock().unwrap();
        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", "/shorts/lost-event");
        let body = doc.body();
        doc.append_child(body, anchor);
        anchor
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.doc.lock().unwrap().is_attached(anchor));

    // Resume: the periodic sweep finds the pre-existing element.
    harness.control.toggle().await.unwrap();
    let doc = harness.doc.clone();
    wait_for("sweep removal", move || {
        !doc.lock().unwrap().is_attached(anchor)
    })
    .await;
}

#[tokio::test]
async fn patched_fetch_substitutes_empty_contents() {
    let harness = spawn_harness(3600).await;

    let response = harness
        .fetch
        .invoke(PageRequest::get(
            "https://www.youtube.com/youtubei/v1/shorts/feed",
        ))
        .await;
    assert_eq!(response, PageResponse::empty_contents());

    let response = harness
        .fetch
        .invoke(PageRequest::get("https://www.youtube.com/youtubei/v1/player"))
        .await;
    assert_eq!(response.body, b"real");
}

#[tokio::test]
async fn click_and_history_guards_redirect_home() {
    let harness = spawn_harness(3600).await;

    let target = {
        let mut doc = harness.doc.lock().unwrap();
        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", "/shorts/abc123");
        let thumb = doc.create_element("img");
        doc.append_child(anchor, thumb);
        thumb
    };
    assert_eq!(
        harness.patcher.on_click(ClickEvent { target }),
        ClickOutcome::Consumed
    );
    assert_eq!(harness.window.current(), rules::CANONICAL_HOME_URL);

    harness.window.navigate("https://www.youtube.com/feed");
    harness
        .history_tx
        .send("https://www.youtube.com/shorts/spa-route".to_string())
        .unwrap();
    let window = harness.window.clone();
    wait_for("history rescue", move || {
        window.current() == rules::CANONICAL_HOME_URL
    })
    .await;
}

#[tokio::test]
async fn disabling_stops_every_page_layer() {
    let harness = spawn_harness(3600).await;
    let original = harness.fetch.current();

    harness.control.toggle().await.unwrap();
    let fetch = harness.fetch.clone();
    wait_for("api patch restore", move || {
        Arc::ptr_eq(&fetch.current(), &original)
    })
    .await;
    assert!(!harness.patcher.view().enabled());

    // DOM insertions now go untouched.
    let shelf = {
        let mut doc = harness.doc.lock().unwrap();
        let shelf = doc.create_element("ytd-reel-shelf-renderer");
        let body = doc.body();
        doc.append_child(body, shelf);
        shelf
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.doc.lock().unwrap().is_attached(shelf));

    // Clicks pass through.
    let target = {
        let mut doc = harness.doc.lock().unwrap();
        let anchor = doc.create_element("a");
        doc.set_attr(anchor, "href", "/shorts/abc123");
        let body = doc.body();
        doc.append_child(body, anchor);
        anchor
    };
    assert_eq!(
        harness.patcher.on_click(ClickEvent { target }),
        ClickOutcome::PassThrough
    );

    // History-API rescues stop too.
    harness
        .history_tx
        .send("https://www.youtube.com/shorts/spa-route".to_string())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_ne!(harness.window.current(), rules::CANONICAL_HOME_URL);
}
