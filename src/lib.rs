//! Headless store dashboard: polls the backend's activity, busy-hours and
//! live-cart endpoints and prints the last known state.
//!
//! [`engine`] owns scheduling and state; [`run`] wires it to the terminal.

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod notification;
pub mod pollers;
pub mod render;
pub mod snapshot;
pub mod types;

use std::sync::Arc;

use chrono::Local;

use config::DashboardConfig;
use engine::{spawn_dashboard, DashboardHandle};
use fetcher::HttpTransport;
use gate::LoadingGate;
use notification::LogNotifier;

/// Entry point for the `yliftdaily` binary.
pub fn run() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::load_config()?;
    if config.api_url.is_none() {
        log::warn!(
            "No API URL configured. Set {} or apiUrl in {}",
            config::API_URL_ENV,
            config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "~/.yliftdaily/config.json".to_string())
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    runtime.block_on(run_dashboard(config))
}

async fn run_dashboard(config: DashboardConfig) -> Result<(), String> {
    let transport =
        HttpTransport::new().map_err(|e| format!("Failed to build HTTP client: {}", e))?;
    let refresh_period = config.accounts_refresh_period();
    let gate = LoadingGate::new(config.startup_floor());

    let handle = spawn_dashboard(config, Arc::new(transport), Arc::new(LogNotifier));
    handle.start().await;

    tokio::select! {
        report = gate.wait(&handle) => match report {
            Some(report) if report.success => log::info!("Dashboard ready"),
            Some(_) => log::warn!("Dashboard started with partial data; periodic refresh disabled"),
            None => return Err("Dashboard engine stopped during startup".to_string()),
        },
        _ = tokio::signal::ctrl_c() => {
            handle.shutdown().await;
            return Ok(());
        }
    }

    let mut ticker = tokio::time::interval(refresh_period);
    let mut last_revision = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => last_revision = Some(print_frame(&handle, last_revision)),
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping dashboard");
                handle.stop().await;
                handle.shutdown().await;
                return Ok(());
            }
        }
    }
}

fn print_frame(handle: &DashboardHandle, last_revision: Option<u64>) -> u64 {
    let snapshot = handle.snapshot();
    log::debug!("Rendering snapshot revision {}", snapshot.revision);
    println!("{}\n", render::render_frame(&snapshot, last_revision, Local::now()));
    snapshot.revision
}
