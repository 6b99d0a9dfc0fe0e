//! # NZ Tides Application Entry Point
//!
//! This binary loads one port's tide table through the shared repository and
//! prints a text report: current height and rate, the next high or low tide,
//! a small graph of the current half-cycle, and the coming days' tides.
//! Missing or expired data produces a message rather than an error exit.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use nztides_lib::config::Config;
use nztides_lib::render::{self, ReportLayout};
use nztides_lib::{query, DirSource, TideRepository};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nz-tides", about = "Tide predictions for New Zealand ports")]
struct Cli {
    /// Port to report on (defaults to the configured port)
    port: Option<String>,

    /// Configuration file
    #[arg(long, default_value = nztides_lib::config::CONFIG_FILE)]
    config: PathBuf,

    /// Directory of .tdat files, overriding the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Days of upcoming tides to list
    #[arg(long)]
    days: Option<u32>,

    /// Report at this Unix time instead of now
    #[arg(long)]
    at: Option<i64>,

    /// Print the current state and next tide as JSON
    #[arg(long)]
    json: bool,

    /// List the ports that have data files and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable verbose debug output
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load_from_path(&cli.config);
    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data.dir.clone());
    let source = DirSource::with_extension(&data_dir, &config.data.extension);
    let repository = TideRepository::with_options(Arc::new(source), config.decode_options());

    if cli.list_ports {
        let ports = repository
            .available_ports()
            .with_context(|| format!("reading data directory {}", data_dir.display()))?;
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }

    let port = cli
        .port
        .clone()
        .unwrap_or_else(|| config.display.default_port.clone());
    let now = cli.at.unwrap_or_else(|| Local::now().timestamp());

    // Decoding runs on the blocking pool; the report waits for it explicitly
    let rt = tokio::runtime::Runtime::new()?;
    let loaded = rt.block_on(repository.ensure_loaded(&port).wait());

    let cache = match loaded {
        Ok(cache) => cache,
        Err(error) => {
            tracing::warn!(port = %port, error = %error, "tide data unavailable");
            println!("{port}");
            println!("{}", render::NO_DATA);
            return Ok(());
        }
    };

    if cli.json {
        let output = json!({
            "port": port,
            "station": cache.station(),
            "at": now,
            "valid_until": cache.valid_until(),
            "fresh": query::is_fresh(&cache, now),
            "current": query::current_state(&cache, now),
            "next": query::next_extremum(&cache, now),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let layout = ReportLayout {
        listing_days: cli.days.unwrap_or(config.display.listing_days),
        graph_rows: config.display.graph_rows,
        graph_cols: config.display.graph_cols,
    };
    print!("{}", render::report(&cache, now, &layout, &Local));

    Ok(())
}
