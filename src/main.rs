//! Session gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ cors ─▶ decode ─▶ session ─▶ auth ─▶ context ─▶ /heartbeat | /v1/*
//!                                         │          │        │
//!                                         ▼          ▼        ▼
//!                                    ┌──────────────────────────┐
//!                                    │   store (redis/memory)   │
//!                                    └──────────────────────────┘
//!     Client Response
//!     ◀────────────── error normalizer ◀─ session commit (Set-Cookie) ◀─ handler
//!
//!     Cross-cutting: config, observability, lifecycle (signals → close store → exit)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use session_gateway::config::{effective_port, load_settings, Environment, Settings};
use session_gateway::http::{GatewayServer, ServerContext};
use session_gateway::lifecycle::{self, Teardown, TerminationSignals};
use session_gateway::observability::{logging, metrics};
use session_gateway::store::StoreConnection;
use session_gateway::v1;

const DEFAULT_CONFIG: &str = "settings.toml";

#[derive(Parser)]
#[command(name = "session-gateway")]
#[command(about = "Session-aware HTTP gateway", long_about = None)]
struct Args {
    /// Settings file (TOML).
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let environment = Environment::from_env();

    let use_defaults = args.config == PathBuf::from(DEFAULT_CONFIG) && !args.config.exists();
    let settings = if use_defaults {
        Settings::default()
    } else {
        load_settings(&args.config)?
    };

    logging::init(&settings.observability, environment)?;
    if use_defaults {
        tracing::warn!(path = %args.config.display(), "Settings file not found, using defaults");
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        %environment,
        server = %settings.server.name,
        "session-gateway starting"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = StoreConnection::new(settings.database.clone());
    lifecycle::connect_store(&store, &settings.database).await;

    let teardown = Arc::new(Teardown::new(store.clone()));
    lifecycle::spawn_signal_handler(TerminationSignals::install()?, teardown);

    let port = effective_port(std::env::var("PORT").ok().as_deref(), &settings.server);
    let listener = TcpListener::bind((settings.server.host.as_str(), port)).await?;
    lifecycle::announce(&settings.server, port);

    let context = ServerContext::new(settings, environment, store);
    GatewayServer::new(context, v1::router()).run(listener).await?;

    Ok(())
}
