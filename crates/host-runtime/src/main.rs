//! # fab-host
//!
//! Runs the equipment session host until Ctrl+C.
//!
//! Build with `--features simulation` to run against simulated tools; a
//! default build links no equipment transport and exits at startup.
//!
//! Environment:
//!
//! - `RUST_LOG` - log filter (default `info`)
//! - `FAB_EQUIPMENT_FILE`, `FAB_RULES_FILE`, `FAB_LOTS_FILE` - input files
//! - `FAB_RECIPE_ROOT` - recipe store root
//! - `FAB_SETTLE_DELAY_MS`, `FAB_REPLY_TIMEOUT_MS` - session timing

use anyhow::{Context, Result};
use host_runtime::{HostConfig, HostRuntime};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = HostConfig::from_env();
    let runtime = HostRuntime::new(config).context("failed to initialize host runtime")?;
    runtime.start().await?;

    info!("Host is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
