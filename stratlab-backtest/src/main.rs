//! Stratlab Backtest - command-line runner for single-asset strategy backtests.
//!
//! ```text
//! # Run one backtest
//! stratlab-backtest run --input request.json
//!
//! # Compare several configurations (or a parameter grid) on the same data
//! stratlab-backtest compare --input sweep.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use stratlab_backtest::backtest::BacktestReport;
use stratlab_backtest::{
    compare_strategies, merge_on_date, BacktestConfig, BacktestEngine, DailyBar, EngineSettings,
    IndicatorSnapshot, ParameterGrid,
};
use stratlab_common::logging::init_logging;
use stratlab_common::{Config, Validate};

#[derive(Parser, Debug)]
#[command(name = "stratlab-backtest")]
#[command(version)]
#[command(about = "Backtest technical trading strategies on daily A-share data", long_about = None)]
struct Cli {
    /// Config file (default: ~/.stratlab/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single backtest
    Run {
        /// JSON file holding `config`, `prices` and `indicators`
        #[arg(short, long)]
        input: PathBuf,

        /// Most recent trades to include in the output
        #[arg(long)]
        trade_limit: Option<usize>,

        /// Print a text report instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Run several configurations over the same data and rank them
    Compare {
        /// JSON file holding `configs` and/or `grid`, plus `prices` and `indicators`
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct RunInput {
    config: BacktestConfig,
    prices: Vec<DailyBar>,
    #[serde(default)]
    indicators: Vec<IndicatorSnapshot>,
}

#[derive(Debug, Deserialize)]
struct CompareInput {
    #[serde(default)]
    configs: Vec<BacktestConfig>,
    #[serde(default)]
    grid: Option<GridInput>,
    prices: Vec<DailyBar>,
    #[serde(default)]
    indicators: Vec<IndicatorSnapshot>,
}

#[derive(Debug, Deserialize)]
struct GridInput {
    base: BacktestConfig,
    #[serde(flatten)]
    grid: ParameterGrid,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load_with_env()?,
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }
    config.validate().context("Invalid configuration")?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::debug!("Stratlab Backtest v{}", env!("CARGO_PKG_VERSION"));

    let settings = EngineSettings::from(&config.backtest);
    let engine = BacktestEngine::new(settings);

    match cli.command {
        Commands::Run {
            input,
            trade_limit,
            text,
        } => run(&engine, &input, trade_limit, text),
        Commands::Compare { input } => compare(&engine, &input),
    }
}

fn run(engine: &BacktestEngine, input: &Path, trade_limit: Option<usize>, text: bool) -> Result<()> {
    let request: RunInput = read_json(input)?;
    let label = request.config.label();

    let result = engine
        .run(&request.config, request.prices, request.indicators)
        .with_context(|| format!("Backtest '{label}' failed"))?;

    if text {
        print!("{}", BacktestReport::generate(&result).text());
        return Ok(());
    }

    let limit = trade_limit.unwrap_or(engine.settings().trade_limit);
    let response = result.into_response(limit);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn compare(engine: &BacktestEngine, input: &Path) -> Result<()> {
    let request: CompareInput = read_json(input)?;

    let configs = compare_configs(request.configs, request.grid.as_ref())
        .with_context(|| format!("Invalid comparison in {}", input.display()))?;
    let ts_code = configs[0].ts_code.clone();

    let series = merge_on_date(&ts_code, request.prices, request.indicators)
        .context("Failed to merge price and indicator history")?;

    let cancel = AtomicBool::new(false);
    let comparison = compare_strategies(engine, &series, &configs, &cancel);
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}

/// Explicit configs followed by the grid expansion, all on one instrument.
fn compare_configs(
    mut configs: Vec<BacktestConfig>,
    grid: Option<&GridInput>,
) -> Result<Vec<BacktestConfig>> {
    if let Some(GridInput { base, grid }) = grid {
        configs.extend(grid.expand(base));
    }
    let Some(first) = configs.first() else {
        bail!("no configs and no grid");
    };
    if let Some(other) = configs.iter().find(|c| c.ts_code != first.ts_code) {
        bail!(
            "all configs must share one ts_code: found '{}' and '{}'",
            first.ts_code,
            other.ts_code
        );
    }
    Ok(configs)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
