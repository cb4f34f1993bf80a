use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use reel_nope::bus;
use reel_nope::config::Config;
use reel_nope::init::{init_block_logger, init_store, setup_logging};
use reel_nope::interceptor::NetworkInterceptor;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or("reel-nope.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting reel-nope...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Open Durable Store
    let store = init_store(&config);

    // 4. Block Event Logger (console + ring buffer for the API)
    let (logger, events_buffer) = init_block_logger(&config);

    // 5. Channels: control requests in, stats broadcasts out
    let (control, control_rx) = bus::control_channel();
    let updates = bus::stats_channel();

    // 6. Interceptor: cold-starts the enabled flag from the store and
    //    answers the control channel. Page contexts connect through
    //    the library surface with clones of `control` and `updates`.
    let interceptor = Arc::new(
        NetworkInterceptor::connect(
            store.clone(),
            updates.clone(),
            logger.clone(),
            config.engine.home_url.clone(),
        )
        .await,
    );
    tokio::spawn(interceptor.clone().run_control_loop(control_rx));

    // 7. API Server (UI observer boundary)
    if config.api.enable {
        let api_control = control.clone();
        let api_events = events_buffer.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            reel_nope::api::start_api_server(api_control, api_events, port).await;
        });
    }

    // 8. Graceful Shutdown
    signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    Ok(())
}
