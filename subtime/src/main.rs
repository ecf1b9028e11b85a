//! Subtime: mirror Uptime Kuma monitors behind simple health endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use subtime::{HttpServer, HttpSource, PageContext, Poller, SnapshotCell, SubtimeConfig};
use subtime_common::init_tracing;

/// Mirror of an Uptime Kuma instance's monitors.
#[derive(Parser, Debug)]
#[command(name = "subtime")]
#[command(about = "Republish Uptime Kuma monitors as a dashboard and health endpoints")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = "subtime.json5")]
    config: PathBuf,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = SubtimeConfig::load_from_file(&args.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}",
            args.config.display(),
            e
        )
    })?;

    // CLI overrides
    if let Some(listen) = args.listen {
        config.http.listen = listen;
        config.validate()?;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Subtime");

    let listen_addr: SocketAddr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let snapshot = Arc::new(SnapshotCell::new());

    let source = HttpSource::new(&config.upstream)?;
    let poller = Poller::new(
        source,
        snapshot.clone(),
        Duration::from_secs(config.upstream.poll_interval_secs),
    );

    let page = PageContext {
        source: config.upstream.url.clone(),
        poll_interval_secs: config.upstream.poll_interval_secs,
        base_url: config.http.base_url(),
    };
    let http_server = HttpServer::new(snapshot.clone(), listen_addr, page)
        .with_static_dir(config.http.static_dir.clone());

    // Start poller
    let poller_task = tokio::spawn(poller.run(shutdown_rx.clone()));

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!(
        dashboard = %format!("http://{}/", listen_addr),
        public_url = %config.http.base_url(),
        "Subtime running"
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = poller_task.await;
        let _ = http_task.await;
    })
    .await;

    let last = snapshot.load();
    info!(
        monitors = last.monitors.len(),
        updates = last.version,
        "Subtime stopped"
    );

    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
