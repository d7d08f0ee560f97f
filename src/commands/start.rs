use anyhow::Result;
use colored::Colorize;
use print_quote::{config, logging::init_tracing, server};
use std::path::PathBuf;
use tracing::info;

/// Execute the start command
///
/// Loads configuration, initializes logging from it and runs the server
/// until a shutdown signal arrives.
pub async fn execute(config_path: PathBuf) -> Result<()> {
    let cfg = config::load_config(&config_path)?;

    init_tracing(&cfg.server.log_level, &cfg.server.log_format);

    println!("{}", "Starting print quote service...".green());
    info!(config = %config_path.display(), "Starting print quote service");

    server::start_server(cfg, config_path).await
}
