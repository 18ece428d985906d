//! colis-station - run the station against a live detector stream
//!
//! Usage: `colis-station [config.json]`

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use colis_core::{ColisError, ColisResult, StationConfig};
use colis_runtime::{init_logging, HeadlessRenderer, LogFormat, Station, Supervisor, Viewport};
use colis_time::SystemClock;
use colis_transport::WsConnector;

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

fn load_config() -> ColisResult<StationConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ColisError::InvalidConfig(format!("{}: {}", path, e)))?;
            StationConfig::from_json_str(&text)?
        }
        None => StationConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(LogFormat::from_env()) {
        eprintln!("colis-station: {}", e);
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    info!(
        url = %config.url,
        rate_per_kg = config.rate_per_kg,
        staleness = %humantime::format_duration(config.staleness_threshold()),
        "starting station"
    );

    let station = Arc::new(Station::new(config.clone(), Arc::new(SystemClock)));
    let eviction = station.spawn_eviction_task();

    let renderer = Arc::new(HeadlessRenderer::new(Viewport::default()));
    let (supervisor, handle) = Supervisor::new(
        WsConnector::new(config.url.clone()),
        Arc::clone(&station),
        Arc::clone(&renderer),
    );
    let supervisor = supervisor.spawn();

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status.tick() => {
                let stats = handle.stats();
                info!(
                    state = ?handle.state(),
                    fps = station.fps(),
                    packages = station.list_packages().len(),
                    frames_rendered = renderer.rendered(),
                    messages = stats.messages,
                    reconnects = stats.reconnects_scheduled,
                    "status"
                );
            }
        }
    }

    info!("shutting down");
    handle.shutdown();
    if let Err(e) = supervisor.await {
        error!(error = %e, "supervisor task failed");
    }
    eviction.abort();
}
