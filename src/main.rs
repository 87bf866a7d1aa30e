use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use mihomo_exporter::{config, logging, AppState, Config, MihomoClient, Poller, SnapshotCache};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "Prometheus exporter for the mihomo proxy daemon", long_about = None)]
struct Args {
    /// Address to listen on for web interface and telemetry
    #[arg(
        long = "web.listen-address",
        env = "WEB_LISTEN_ADDRESS",
        default_value_t = config::listen_address()
    )]
    listen_address: SocketAddr,

    /// Mihomo API base URL
    #[arg(
        long = "mihomo.api-url",
        env = "MIHOMO_API_URL",
        default_value = config::API_URL
    )]
    api_url: String,

    /// Mihomo API secret token (if any)
    #[arg(long = "mihomo.api-token", env = "MIHOMO_API_TOKEN")]
    api_token: Option<String>,

    /// Interval at which to scrape traffic and connections
    #[arg(
        long = "scrape.interval",
        env = "SCRAPE_INTERVAL",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    scrape_interval: Duration,

    /// Interval at which to test proxy latency
    #[arg(
        long = "latency.interval",
        env = "LATENCY_INTERVAL",
        default_value = "60s",
        value_parser = humantime::parse_duration
    )]
    latency_interval: Duration,

    /// Prefix for all exported metrics
    #[arg(
        long = "metric.prefix",
        env = "METRIC_PREFIX",
        default_value = config::METRIC_PREFIX
    )]
    metric_prefix: String,

    /// How long to wait for background loops during shutdown
    #[arg(
        long = "shutdown.grace",
        env = "SHUTDOWN_GRACE",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    shutdown_grace: Duration,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            listen_address: args.listen_address,
            api_url: args.api_url,
            api_token: args.api_token,
            scrape_interval: args.scrape_interval,
            latency_interval: args.latency_interval,
            metric_prefix: args.metric_prefix,
            shutdown_grace: args.shutdown_grace,
        }
    }
}

fn main() -> Result<()> {
    logging::init();

    let config = Config::from(Args::parse());
    config.validate()?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    info!("starting mihomo exporter");
    info!("connecting to mihomo api at {}", config.api_url);

    let client = Arc::new(MihomoClient::new(&config.api_url, config.api_token.clone())?);
    let cache = Arc::new(SnapshotCache::new());
    let shutdown = CancellationToken::new();

    // Both loops refresh once immediately, then tick on their own cadence.
    let poller = Poller::new(client, Arc::clone(&cache));
    let (fast_loop, slow_loop) =
        poller.spawn(config.scrape_interval, config.latency_interval, &shutdown);

    let listener = TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    info!("listening on {}", config.listen_address);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, gracefully shutting down");
        signal_token.cancel();
    });

    let state = AppState {
        cache,
        metric_prefix: config.metric_prefix.into(),
    };
    mihomo_exporter::server::serve(listener, state, shutdown)
        .await
        .context("http server failed")?;

    // The server has drained; give the refresh loops the grace period to
    // observe cancellation and finish their in-flight activations.
    let drain = async {
        let _ = fast_loop.await;
        let _ = slow_loop.await;
    };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        anyhow::bail!(
            "refresh loops did not stop within {:?}",
            config.shutdown_grace
        );
    }

    info!("exporter stopped");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
