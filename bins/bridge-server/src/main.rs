mod ingest;

use std::sync::Arc;

use bridge_engine::{Bridge, BridgeConfig, Collaborators, LocalBus, SystemClock, TcpSink, TokioTimers};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "bridge-server", about = "Forward bus topics to a remote TCP endpoint")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "bridge.toml", env = "BRIDGE_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config, "loading configuration");
    let config = match BridgeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let addr = config.transport.addr();
    let sink = match TcpSink::connect(&addr, config.transport.buffer).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to connect transport");
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Handle::current();
    let bus = Arc::new(LocalBus::new(runtime.clone()));
    let collaborators = Collaborators {
        bus: bus.clone(),
        timers: Arc::new(TokioTimers::new(runtime)),
        clock: Arc::new(SystemClock),
        sink: sink.clone(),
    };

    tracing::info!(topics = config.topics.len(), "bootstrapping bridge");
    let bridge = match Bridge::bootstrap(&config, collaborators) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap bridge");
            std::process::exit(1);
        }
    };

    let token = CancellationToken::new();
    let ingest = match &config.ingest {
        Some(ingest_cfg) => {
            let ingest_addr = ingest_cfg.addr();
            match tokio::net::TcpListener::bind(&ingest_addr).await {
                Ok(listener) => {
                    tracing::info!(addr = %ingest_addr, "ingest endpoint listening");
                    Some(tokio::spawn(ingest::serve(listener, bus.clone(), token.clone())))
                }
                Err(e) => {
                    tracing::error!(addr = %ingest_addr, error = %e, "failed to bind ingest endpoint");
                    bridge.shutdown();
                    std::process::exit(1);
                }
            }
        }
        None => None,
    };

    tracing::info!("bridge-server started, press Ctrl+C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
    tracing::info!("shutting down...");

    token.cancel();
    if let Some(handle) = ingest {
        let _ = handle.await;
    }
    bridge.shutdown();
    sink.close().await;
}
