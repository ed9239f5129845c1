//! Main entry point for the marketplace service.
//!
//! Loads the configuration, assembles the engine from the storage and pricing
//! implementations it names, and serves the HTTP API until interrupted.

use clap::Parser;
use market_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod identity;
mod server;

/// Command-line arguments for the marketplace service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/market.toml", env = "MARKET_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started marketplace");

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.market.id);

	let api_config = match config.api.clone() {
		Some(api) if api.enabled => api,
		_ => {
			tracing::warn!("API server disabled in configuration, nothing to serve");
			return Ok(());
		},
	};

	let engine = Arc::new(factory_registry::build_market_from_config(config)?);
	server::start_server(api_config, engine).await?;

	tracing::info!("Stopped marketplace");
	Ok(())
}
