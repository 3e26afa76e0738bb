//! addhandler server.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                      ADDHANDLER                        │
//!                    │                                                        │
//!  POST /addhandler  │  ┌────────┐   ┌─────────┐   ┌────────┐   ┌──────────┐  │
//!  ──────────────────┼─▶│  http  │──▶│ builder │──▶│ loader │──▶│ routing  │  │
//!                    │  │ server │   │ (rustc) │   │(dlopen)│   │ register │  │
//!  ◀── 302 / 500 ────┼──│        │   └─────────┘   └────────┘   └────┬─────┘  │
//!                    │  │        │                                   │        │
//!  GET <route>       │  │        │◀──────── handler table ───────────┤        │
//!  ──────────────────┼─▶│        │                                   │        │
//!                    │  │        │◀──────── registry snapshot ───────┘        │
//!  GET /             │  │        │   (listing view)                           │
//!  ──────────────────┼─▶└────────┘                                            │
//!                    │                                                        │
//!                    │   config · observability · lifecycle · admin           │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use addhandler::config::{self, AppConfig};
use addhandler::lifecycle::startup;
use addhandler::observability::logging;

#[derive(Parser)]
#[command(name = "addhandler")]
#[command(about = "Compile submitted handlers and serve them as live routes", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for build-setting changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        config::validation::validate_config(&config)
            .map_err(config::ConfigError::Validation)?;
    }

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        compiler = %config.build.compiler,
        "addhandler starting"
    );

    startup::run(config, cli.config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
