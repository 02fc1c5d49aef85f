//! CLI Entry Point for battery-cycler
//!
//! Loads a cycler data directory and prints the requested view as JSON on
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! battery-cycler info /data/LCO_2500mAh_cell01
//! battery-cycler dqdv /data/LCO_2500mAh_cell01 3 --segment discharge
//! battery-cycler dcir /data/LCO_2500mAh_cell01 2-5 --expected 4
//! battery-cycler fade /data/LCO_2500mAh_cell01 --cycles "1 2 10-20"
//! ```

use anyhow::{Context, Result};
use battery_cycler::config::{Settings, DEFAULT_CONFIG_PATH};
use battery_cycler::data::dcir::measure_dcir;
use battery_cycler::data::differential::{differential_capacity, Segment};
use battery_cycler::data::fade::analyze_fade;
use battery_cycler::data::store::CycleStore;
use battery_cycler::data::summary::summarize_store;
use battery_cycler::instrument::load_source;
use battery_cycler::logging::{self, LoggingConfig, OutputFormat};
use battery_cycler::metadata::StoreMetadata;
use battery_cycler::selection::{parse_cycle_range, CycleSelection};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Parser)]
#[command(name = "battery-cycler")]
#[command(about = "Cycle-indexed loading and analysis of battery cycler data", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, default_value_t = OutputFormat::Compact)]
    log_format: OutputFormat,

    /// Nominal capacity in mAh, overriding every automatic strategy
    #[arg(long, global = true)]
    capacity: Option<f64>,

    /// Continue with the cycles that parsed when some cycle files fail
    #[arg(long, global = true)]
    allow_partial: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected family, resolved capacity and available cycles
    Info {
        /// Data directory
        path: PathBuf,
    },

    /// Print one cycle
    Cycle {
        path: PathBuf,
        cycle: u32,
    },

    /// Print an inclusive range of cycles as one contiguous series
    Range {
        path: PathBuf,
        /// Range such as "3-5"
        range: String,
    },

    /// Differential capacity (dQ/dV and dV/dQ) of one cycle
    Dqdv {
        path: PathBuf,
        cycle: u32,

        /// Odd smoothing window; derived from the sample count when omitted
        #[arg(long)]
        window: Option<usize>,

        /// full, charge or discharge
        #[arg(long)]
        segment: Option<Segment>,
    },

    /// Pulse DC internal resistance over a range of cycles
    Dcir {
        path: PathBuf,
        /// Range such as "2-5"
        range: String,

        /// Number of pulses expected in the sweep
        #[arg(long)]
        expected: Option<usize>,
    },

    /// Capacity fade and reliability grade
    Fade {
        path: PathBuf,

        /// Cycle selection such as "1 2 5-9"; all cycles when omitted
        #[arg(long)]
        cycles: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    metadata: &'a StoreMetadata,
    cycles: Vec<u32>,
    failures: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(capacity) = cli.capacity {
        settings.capacity.manual_mah = Some(capacity);
        settings.validate()?;
    }

    let logging_config = LoggingConfig::from_settings(&settings)
        .map_err(anyhow::Error::msg)?
        .with_format(cli.log_format);
    logging::init(logging_config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Info { path } => {
            let outcome = load_source(&path, &settings)?;
            let failures = outcome.failures.iter().map(ToString::to_string).collect();
            print_json(&InfoReport {
                metadata: outcome.store.metadata(),
                cycles: outcome.store.list_available(),
                failures,
            })
        }
        Commands::Cycle { path, cycle } => {
            let store = open(&path, &settings, cli.allow_partial)?;
            print_json(&store.get(cycle)?)
        }
        Commands::Range { path, range } => {
            let (start, end) = parse_cycle_range(&range)?;
            let store = open(&path, &settings, cli.allow_partial)?;
            print_json(&store.get_range(start, end)?)
        }
        Commands::Dqdv {
            path,
            cycle,
            window,
            segment,
        } => {
            let mut differential = settings.differential.clone();
            if window.is_some() {
                differential.window = window;
            }
            if let Some(segment) = segment {
                differential.segment = segment;
            }
            differential.validate()?;

            let store = open(&path, &settings, cli.allow_partial)?;
            let table = store.get(cycle)?;
            print_json(&differential_capacity(
                table.samples(),
                store.capacity_mah(),
                &differential,
            )?)
        }
        Commands::Dcir {
            path,
            range,
            expected,
        } => {
            let mut dcir = settings.dcir.clone();
            if let Some(expected) = expected {
                dcir.expected_pulses = expected;
            }
            dcir.validate()?;

            let (start, end) = parse_cycle_range(&range)?;
            let store = open(&path, &settings, cli.allow_partial)?;
            let series = store.get_range(start, end)?;
            print_json(&measure_dcir(&series.samples, store.capacity_mah(), &dcir)?)
        }
        Commands::Fade { path, cycles } => {
            let selection = cycles
                .as_deref()
                .map(str::parse::<CycleSelection>)
                .transpose()?;
            let store = open(&path, &settings, cli.allow_partial)?;
            let wanted = selection.map(|s| s.cycles()).unwrap_or_default();

            let summaries = summarize_store(&store, &wanted);
            let report = analyze_fade(&summaries)?;
            print_json(&serde_json::json!({
                "summaries": summaries,
                "report": report,
            }))
        }
        Commands::Config => {
            let rendered = settings.to_toml_string()?;
            std::io::stdout().write_all(rendered.as_bytes())?;
            Ok(())
        }
    }
}

/// Loads `path`, rejecting partial stores unless `allow_partial` is set.
fn open(path: &Path, settings: &Settings, allow_partial: bool) -> Result<CycleStore> {
    let outcome = load_source(path, settings)?;
    for failure in &outcome.failures {
        warn!(%failure, "Cycle file skipped");
    }
    if allow_partial {
        Ok(outcome.store)
    } else {
        Ok(outcome.into_complete()?)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
