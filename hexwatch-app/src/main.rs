use anyhow::Result;
use clap::Parser;
use hexwatch_common::observability::{LogConfig, LogFormat, init_logging};
use hexwatch_config::{HexwatchConfig, HexwatchConfigLoader};
use std::path::PathBuf;
use tracing::info;
use wiring::Hexwatch;
mod wiring;

/// Periodically scrape tweets and cache every 0x address they mention.
#[derive(Parser, Debug)]
#[command(name = "hexwatch", version)]
struct Cli {
    /// YAML config file. Missing is fine; env vars and defaults still apply.
    #[arg(short, long, env = "HEXWATCH_CONFIG", default_value = "hexwatch.yaml")]
    config: PathBuf,

    /// Run a single cycle and exit instead of scheduling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let cfg: HexwatchConfig = HexwatchConfigLoader::new().with_file(&cli.config).load()?;

    // 2) Logging, before anything that logs
    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.log_dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.logging.emit_stderr,
        format: cfg.logging.format.parse::<LogFormat>()?,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    })?;
    info!(log=%log_path.display(), config=%cli.config.display(), "app.start");

    let app = Hexwatch::build_from_config(&cfg).await?;
    if cli.once {
        let report = app.run_once().await?;
        info!(?report, "app.once.done");
        return Ok(());
    }
    app.run_until_ctrl_c().await
}
