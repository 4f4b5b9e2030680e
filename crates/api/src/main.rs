//! ModuMind API server binary.
//!
//! Usage:
//!   modumind-api --config config.toml
//!   modumind-api --port 8080
//!   modumind-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `MODUMIND_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `OPENAI_API_KEY` - API key for the delegation model
//! - `RUST_LOG` - Log filter

use clap::Parser;
use modumind_api::{AppState, serve};
use modumind_orchestrator::OrchestratorConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "modumind-api", version, about = "ModuMind orchestrator API server")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address
    #[arg(short, long, env = "MODUMIND_BIND_ADDR", default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modumind_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes the API to all network interfaces. \
             The API has no authentication; put it behind a firewall or proxy."
        );
    }

    let config = if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
        OrchestratorConfig::from_file(path)?
    } else {
        tracing::info!("Using default configuration");
        OrchestratorConfig::default()
    };

    let state = AppState::new(config)?;
    tracing::info!(
        agents = state.orchestrator.list_agents().len(),
        delegate = %state.orchestrator.delegate_name(),
        "Orchestrator ready"
    );

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    serve(Arc::new(state), addr).await
}
