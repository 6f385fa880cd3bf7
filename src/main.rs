//! Aloha greeting service.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                        ALOHA                         │
//!                     │                                                      │
//!  Client Request     │  ┌───────────┐   ┌─────────────┐   ┌─────────────┐   │
//!  ───────────────────┼─▶│   http    │──▶│ server span │──▶│  greeting   │   │
//!                     │  │  server   │   │ middleware  │   │   service   │   │
//!                     │  └───────────┘   └─────────────┘   └──────┬──────┘   │
//!                     │   event loop (current-thread)             │          │
//!                     │  ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─┼─ ─ ─ ─ ─ │
//!                     │   worker pool (multi-thread)              ▼          │
//!                     │                                   ┌──────────────┐   │
//!                     │                                   │   circuit    │   │
//!                     │                                   │   breaker    │   │
//!                     │                                   └──────┬───────┘   │
//!                     │                                          ▼           │
//!                     │                                   ┌──────────────┐   │  B3 headers
//!                     │                                   │   outbound   │───┼──────────▶ bonjour
//!                     │                                   │    client    │   │
//!                     │                                   └──────────────┘   │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Handle;

use aloha::config::{self, AlohaConfig};
use aloha::dispatch::{Dispatcher, WorkerPool};
use aloha::http::HttpServer;
use aloha::lifecycle::{signals, Shutdown};
use aloha::observability::{logging, metrics, trace::Tracer};

const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "aloha", version, about = "Aloha greeting service")]
struct Cli {
    /// TOML configuration file. Environment variables override its values.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("aloha v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        hostname = %config.greeting.hostname,
        downstream = %config.downstream.base_url(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let workers = WorkerPool::new(&config.dispatcher)?;
    let event_loop = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = event_loop.block_on(serve(config, workers.handle()));

    drop(event_loop);
    workers.shutdown(WORKER_SHUTDOWN_TIMEOUT);

    tracing::info!("Shutdown complete");
    result
}

async fn serve(config: AlohaConfig, workers: Handle) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tracer = Tracer::from_config(&config.tracing);
    let dispatcher = Dispatcher::new(workers, config.dispatcher.max_in_flight)
        .with_queue_timeout(config.dispatcher.queue_timeout());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, tracer, dispatcher)?;

    let shutdown = Shutdown::new();
    let signal_task = signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;
    signal_task.abort();
    Ok(())
}
