// Attendant
// Main entry point for the attendant binary

use attendant_engine::cli::{Cli, Command};
use attendant_engine::config::Config;
use attendant_engine::handlers::{
    handle_credentials, handle_latest, handle_run, handle_status, OutputFormat,
};
use attendant_engine::telemetry::init_telemetry_with_level;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log beats the config file; RUST_LOG beats both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    let log_file = config
        .core
        .log_to_file
        .then(|| config.core.data_dir.join("attendant.log"));
    init_telemetry_with_level(log_level, log_file.as_deref());

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Attendant v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Handle commands
    match cli.command {
        Command::Run(args) => {
            tracing::info!("Starting attendance loop...");
            handle_run(args, &config).await
        }

        Command::Latest => handle_latest(&config, format).await,

        Command::Status => handle_status(&config, format).await,

        Command::Credentials => handle_credentials().await,
    }
}
