mod config;
mod manager;

use crate::config::Config;
use crate::manager::{Manager, write_report};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// JSON array of pull requests.
    #[arg(long)]
    input: PathBuf,

    /// TOML analysis configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report file, stdout if absent.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overrides the configured granularity (weekly or monthly).
    #[arg(long)]
    granularity: Option<String>,

    /// Fill empty periods before comparing trends.
    #[arg(long)]
    fill_gaps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    LeadTimes,

    Summary,

    Trend,

    Compare,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut cfg = match &args.config {
        Some(file) => Config::from_file(file).context("failed to construct cfg")?,
        None => Config::default(),
    };
    if let Some(granularity) = args.granularity {
        cfg.granularity = granularity;
    }
    cfg.fill_gaps |= args.fill_gaps;
    cfg.validate().context("failed to validate cfg")?;
    log::info!("{cfg:#?}");

    let mgr = Manager::new(&args.input, cfg).context("failed to construct mgr")?;

    match args.command {
        Command::LeadTimes => write_report(mgr.lead_times(), args.output)?,
        Command::Summary => write_report(&mgr.summary(), args.output)?,
        Command::Trend => write_report(&mgr.trend(), args.output)?,
        Command::Compare => write_report(&mgr.compare(), args.output)?,
    }

    Ok(())
}
