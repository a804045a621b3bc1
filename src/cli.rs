//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::calendar_adapter::{CsvCalendarAdapter, WeekdayCalendar};
use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::dataset::Dataset;
use crate::domain::error::ArborError;
use crate::domain::simulator::Simulator;
use crate::domain::strategy::Strategy;
use crate::ports::calendar_port::CalendarPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DEFAULT_INITIAL_INVESTMENT: f64 = 100_000.0;

#[derive(Parser, Debug)]
#[command(name = "arbor", about = "Declarative trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and print the report as JSON
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy document
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Show the available data range for an identifier
    Info {
        #[arg(long)]
        identifier: String,
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
        } => run_backtest(&config, &strategy, output.as_ref()),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Info { identifier, config } => run_info(&identifier, &config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

pub fn load_strategy(path: &PathBuf) -> Result<Strategy, ExitCode> {
    let content = fs::read_to_string(path).map_err(|e| {
        let err = ArborError::Io(e);
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })?;
    let strategy = Strategy::from_json(&content).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    strategy.validate().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(strategy)
}

fn build_data_adapter(adapter: &FileConfigAdapter) -> Result<CsvDataAdapter, ExitCode> {
    let data_path = adapter.require_string("data", "path").map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(CsvDataAdapter::new(PathBuf::from(data_path)))
}

fn build_calendar(adapter: &FileConfigAdapter) -> Box<dyn CalendarPort> {
    match adapter.get_string("calendar", "path") {
        Some(path) => Box::new(CsvCalendarAdapter::new(PathBuf::from(path))),
        None => Box::new(WeekdayCalendar),
    }
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_path: &PathBuf,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Load and validate strategy
    eprintln!("Loading strategy from {}", strategy_path.display());
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("Loading strategy: {}", strategy.name);

    // Stage 3: Trading calendar
    let calendar = build_calendar(&adapter);
    let trading_days = match calendar.trading_days(strategy.start_date, strategy.end_date) {
        Ok(days) => days,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    eprintln!(
        "Calendar: {} trading days from {} to {}",
        trading_days.len(),
        strategy.start_date,
        strategy.end_date
    );

    // Stage 4: Assemble dataset
    let data_port = match build_data_adapter(&adapter) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let identifiers = strategy.identifiers();
    eprintln!("Fetching data for {} identifiers...", identifiers.len());
    let dataset = match Dataset::assemble(&strategy, &data_port) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    // Stage 5: Simulate
    let initial_investment = adapter.get_double(
        "backtest",
        "initial_investment",
        DEFAULT_INITIAL_INVESTMENT,
    );
    let simulator = match Simulator::new(&strategy, &dataset, trading_days, initial_investment) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    eprintln!("Running backtest...");
    let report = simulator.backtest(None);
    eprintln!(
        "Done: {} traded dates, {} issues",
        report.record.traded_dates.len(),
        report.issues.asset_errors.len()
            + report.issues.series_errors.len()
            + report.issues.indicator_errors.len()
    );

    // Stage 6: Emit report
    let json = match serde_json::to_string_pretty(&report) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("error: failed to serialize report: {e}");
            return ExitCode::from(1);
        }
    };
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                let err = ArborError::Io(e);
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    ExitCode::SUCCESS
}

fn run_validate(strategy_path: &PathBuf) -> ExitCode {
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let identifiers = strategy.identifiers();
    println!("Strategy '{}' is valid", strategy.name);
    println!("  range: {} to {}", strategy.start_date, strategy.end_date);
    println!(
        "  rebalance: {:?}, threshold: {}",
        strategy.trading_frequency, strategy.trading_threshold
    );
    println!("  identifiers: {}", identifiers.join(", "));
    ExitCode::SUCCESS
}

fn run_info(identifier: &str, config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = match build_data_adapter(&adapter) {
        Ok(p) => p,
        Err(code) => return code,
    };

    match data_port.fetch_series(identifier) {
        Ok(Some(series)) => {
            let mut columns: Vec<&str> = series.column_names().collect();
            columns.sort_unstable();
            println!("{identifier}: {} rows", series.len());
            if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
                println!("  range: {first} to {last}");
            }
            println!("  columns: {}", columns.join(", "));
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("no data for {identifier}");
            ExitCode::from(4)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}
