//! ==============================================================================
//! main.rs - crossing monitor entry point
//! ==============================================================================
//!
//! purpose:
//!     loads configuration, mounts the monitor (pollers + view task) and
//!     serves the dashboard until ctrl-c, then unmounts cleanly.
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                      host process                           │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ train poll  │  │ signal poll │  │ web server          │  │
//!     │  │ (100ms)     │  │ (100ms)     │  │ (port 3000)         │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────▲──────────┘  │
//!     │         │ FeedEvent      │                    │ snapshot    │
//!     │         └───────┬────────┘                    │             │
//!     │           ┌─────┴──────┐                      │             │
//!     │           │  monitor   ├──────────────────────┘             │
//!     │           │  + ticks   │ <- monitor.rs                      │
//!     │           └────────────┘                                    │
//!     └─────────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::{Context, Result};
use crossing_monitor::config::MonitorConfig;
use crossing_monitor::monitor::{Monitor, Sources};
use crossing_monitor::server;
use tracing::{error, info, warn};
use tracing_subscriber::filter::{Directive, EnvFilter};

fn setup_logging(level: &str) {
    let directive: Directive = match level.parse() {
        Ok(directive) => directive,
        Err(_) => {
            eprintln!("[CONFIG] Warning: invalid log level '{}', using info", level);
            tracing::Level::INFO.into()
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Grade Crossing Monitor");
    println!("  \"Newest record wins, countdown never stalls\"");
    println!("===========================================================");

    // step 1: load configuration
    let config = MonitorConfig::load_or_default();
    config.print_summary();
    setup_logging(&config.logging.level);

    // step 2: build record sources
    let sources = Sources::from_config(&config).context("failed to build record sources")?;

    // step 3: mount pollers and the view task
    let handle = Monitor::mount(&config, sources);
    info!("[STARTUP] ✓ Monitor mounted");

    // step 4: start the web server in background
    let bind = config.server.bind.clone();
    let snapshots = handle.subscribe();
    let web = tokio::spawn(async move {
        if let Err(e) = server::run_server(&bind, snapshots).await {
            error!("[SERVER] Web server error: {:#}", e);
        }
    });

    // step 5: run until ctrl-c
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[RUNTIME] ctrl-c handler failed: {}", e);
    }
    info!("[RUNTIME] Shutting down");
    web.abort();
    handle.unmount().await;
    Ok(())
}
