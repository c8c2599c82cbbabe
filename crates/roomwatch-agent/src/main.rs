//! # roomwatch-agent
//!
//! Keeps the hub session alive and publishes presence and temperature
//! telemetry.
//!
//! ## Running
//!
//! ```bash
//! # Simulated hardware on a development machine
//! ROOMWATCH_HARDWARE__SIMULATE=true cargo run --package roomwatch-agent --features mock-hardware
//!
//! # On the device
//! ROOMWATCH_ENV=production ./roomwatch-agent
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use roomwatch_agent::api::create_router;
use roomwatch_agent::state::AppState;
use roomwatch_agent::{agent, logging, runner};
use roomwatch_core::{AgentConfig, AgentStatus, RoomwatchError, StatusConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::is_production())?;

    let config_path = AgentConfig::config_path();
    let config = AgentConfig::load_or_default(&config_path)
        .map_err(RoomwatchError::from)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        device_id = %config.hub.device_id,
        host = %config.hub.host,
        simulate = config.hardware.simulate,
        "starting roomwatch-agent"
    );

    let (status_tx, status_rx) = watch::channel(AgentStatus::default());
    if config.status.enabled {
        serve_status(&config.status, AppState::new(status_rx, &config.hub.device_id)).await?;
    }

    let tick = config.sampling.tick_interval();
    if config.hardware.simulate {
        #[cfg(feature = "mock-hardware")]
        {
            let mut cycle = agent::simulated::simulated_cycle(&config);
            runner::run(&mut cycle, tick, &status_tx, shutdown_signal()).await;
        }
        #[cfg(not(feature = "mock-hardware"))]
        anyhow::bail!("hardware.simulate requires a build with the mock-hardware feature");
    } else {
        let mut cycle = agent::device_cycle(&config)?;
        runner::run(&mut cycle, tick, &status_tx, shutdown_signal()).await;
    }

    info!("roomwatch-agent stopped");
    Ok(())
}

/// Bind the status API and serve it in the background.
async fn serve_status(config: &StatusConfig, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind.as_str())
        .await
        .with_context(|| format!("binding status API to {}", config.bind))?;
    info!(addr = %config.bind, "status API listening");

    let app = create_router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "status API stopped");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
