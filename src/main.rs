//! Record Card MCP Server - Entry point
//!
//! Usage: `record-card-mcp-server [RESOURCE_DIR...]`
//!
//! Path sources are restricted to the given directories when any are passed.
//! `RECORD_CARD_PROFILE` names a TOML file with extra extraction strategies.

use record_card_mcp_server::{run_server_with_config, ExtractionProfile, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging. stdout carries the MCP transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "record_card_mcp_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Record Card MCP Server");

    let mut config = ServerConfig {
        resource_dirs: std::env::args().skip(1).collect(),
        ..ServerConfig::default()
    };

    if let Ok(path) = std::env::var("RECORD_CARD_PROFILE") {
        config.pipeline.profile = ExtractionProfile::load(&path)?;
        tracing::info!(profile = %path, "loaded extraction profile overlay");
    }

    run_server_with_config(config).await
}
