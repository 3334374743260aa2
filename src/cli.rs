//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvBarProvider;
use crate::adapters::csv_report::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report::JsonReportAdapter;
use crate::adapters::validators::{AcceptAllValidator, TimeoutValidator, VolumeFilterValidator};
use crate::domain::backtest::BacktestConfig;
use crate::domain::batch::{BatchReport, run_batch};
use crate::domain::config_validation::{parse_date, validate_run_config};
use crate::domain::error::DipbuyerError;
use crate::domain::state_machine::SimulationParams;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::IndicatorProvider;
use crate::ports::report_port::ReportPort;
use crate::ports::validator_port::EntryValidator;

#[derive(Parser, Debug)]
#[command(name = "dipbuyer", about = "Buy-the-dip position lifecycle simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over the configured symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run a single symbol instead of the configured list
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            code,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, code.as_deref())
            } else {
                run_backtest(&config, output.as_deref(), code.as_deref())
            }
        }
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, DipbuyerError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, DipbuyerError> {
    let start_date = parse_date(
        adapter.get_string("backtest", "start_date").as_deref(),
        "start_date",
    )?;
    let end_date = parse_date(
        adapter.get_string("backtest", "end_date").as_deref(),
        "end_date",
    )?;

    let defaults = SimulationParams::default();
    let context_window = adapter.get_int(
        "backtest",
        "context_window",
        defaults.context_window as i64,
    );
    let threads = adapter.get_int("backtest", "threads", 0);

    Ok(BacktestConfig {
        start_date,
        end_date,
        params: SimulationParams {
            capital_per_fill: adapter.get_double(
                "backtest",
                "capital_per_fill",
                defaults.capital_per_fill,
            ),
            context_window: usize::try_from(context_window).unwrap_or(1).max(1),
        },
        threads: usize::try_from(threads).unwrap_or(0),
    })
}

/// Symbols to run: the `--code` override, else `codes`, else `code`.
pub fn resolve_symbols(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, DipbuyerError> {
    let (key, raw) = match code_override {
        Some(c) => ("code", Some(c.to_string())),
        None => match config.get_string("backtest", "codes") {
            Some(codes) => ("codes", Some(codes)),
            None => ("code", config.get_string("backtest", "code")),
        },
    };

    let raw = raw.ok_or_else(|| DipbuyerError::ConfigMissing {
        section: "backtest".into(),
        key: key.into(),
    })?;

    parse_symbols(&raw).map_err(|e| DipbuyerError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

pub fn build_provider(config: &dyn ConfigPort) -> Result<CsvBarProvider, DipbuyerError> {
    let dir = config
        .get_string("data", "dir")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DipbuyerError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })?;
    Ok(CsvBarProvider::new(PathBuf::from(dir.trim())))
}

/// The configured validator, always bounded by `timeout_ms`.
pub fn build_validator(config: &dyn ConfigPort) -> Box<dyn EntryValidator + Send + Sync> {
    let timeout_ms = u64::try_from(config.get_int("validator", "timeout_ms", 2_000)).unwrap_or(1);
    let timeout = Duration::from_millis(timeout_ms.max(1));
    let kind = config
        .get_string("validator", "kind")
        .unwrap_or_else(|| "accept_all".to_string());

    match kind.trim() {
        "volume" => {
            let min = config.get_double("validator", "min_avg_volume", 0.0);
            Box::new(TimeoutValidator::new(VolumeFilterValidator::new(min), timeout))
        }
        _ => Box::new(TimeoutValidator::new(AcceptAllValidator, timeout)),
    }
}

/// The report writer and destination. `[report] format` wins; otherwise the
/// output extension decides, defaulting to CSV.
pub fn build_reporter(
    config: &dyn ConfigPort,
    output_override: Option<&Path>,
) -> Option<(Box<dyn ReportPort>, PathBuf)> {
    let output = output_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output").map(PathBuf::from))?;

    let format = config.get_string("report", "format").or_else(|| {
        output
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    });

    let reporter: Box<dyn ReportPort> = match format.as_deref().map(str::trim) {
        Some("json") => Box::new(JsonReportAdapter::new()),
        _ => Box::new(CsvReportAdapter::new()),
    };
    Some((reporter, output))
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    code_override: Option<&str>,
) -> Result<(), DipbuyerError> {
    let adapter = load_config(config_path)?;
    validate_run_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let symbols = resolve_symbols(code_override, &adapter)?;
    let provider = build_provider(&adapter)?;
    let validator = build_validator(&adapter);
    let reporter = build_reporter(&adapter, output_path);

    eprintln!(
        "Running {} symbols from {} to {}...",
        symbols.len(),
        bt_config.start_date,
        bt_config.end_date
    );

    let report = run_backtest_pipeline(&provider, validator.as_ref(), &bt_config, &symbols)?;
    print_summary(&report);

    if let Some((reporter, path)) = reporter {
        reporter.write(&report, &path)?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

/// Run every symbol; fails only when no symbol completed.
pub fn run_backtest_pipeline(
    provider: &(dyn IndicatorProvider + Sync),
    validator: &(dyn EntryValidator + Sync),
    bt_config: &BacktestConfig,
    symbols: &[String],
) -> Result<BatchReport, DipbuyerError> {
    let report = run_batch(provider, symbols, validator, bt_config, None);

    for failure in &report.failures {
        eprintln!("warning: skipping {} ({})", failure.symbol, failure.reason);
    }

    if report.results.is_empty() {
        let failed: Vec<&str> = report.failures.iter().map(|f| f.symbol.as_str()).collect();
        return Err(DipbuyerError::NoData {
            symbol: failed.join(","),
        });
    }
    Ok(report)
}

pub fn print_summary(report: &BatchReport) {
    let s = &report.summary;
    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Closed Positions: {}", s.closed_positions);
    eprintln!(
        "Win Rate:         {:.1}% ({}W / {}L / {}BE)",
        s.win_rate * 100.0,
        s.wins,
        s.losses,
        s.breakeven
    );
    eprintln!("Total P&L:        {:.2}", s.total_pnl);
    eprintln!("Total Return:     {:.2}%", s.total_return * 100.0);
    eprintln!("Avg Return:       {:.2}%", s.avg_return * 100.0);
    eprintln!("Profit Factor:    {:.2}", s.profit_factor);
    eprintln!("Avg Days to Exit: {:.1}", s.avg_days_to_exit);
    eprintln!("Worst Drawdown:   {:.1}%", s.worst_drawdown_pct * 100.0);
    eprintln!("Avg Fills:        {:.2}", s.avg_fills);
    if s.open_positions > 0 {
        eprintln!(
            "Open Positions:   {} (unrealized {:.2}, {:.2}%)",
            s.open_positions,
            s.unrealized_pnl,
            s.unrealized_return * 100.0
        );
    }

    if report.results.len() > 1 {
        eprintln!("\n=== Per-Symbol Summary ===");
        eprintln!(
            "{:<8} {:>8} {:>8} {:>8} {:>8} {:>10}",
            "Symbol", "Signals", "Trades", "Reentry", "Win%", "P&L"
        );
        for r in &report.results {
            eprintln!(
                "{:<8} {:>8} {:>8} {:>8} {:>7.1}% {:>10.2}",
                r.symbol,
                r.signals.detected,
                r.summary.closed_positions,
                r.re_entries,
                r.summary.win_rate * 100.0,
                r.summary.total_pnl
            );
        }
    }
}

pub fn run_dry_run(config_path: &Path, code_override: Option<&str>) -> Result<(), DipbuyerError> {
    let adapter = load_config(config_path)?;
    validate_run_config(&adapter)?;
    eprintln!("Config validated successfully");

    let bt_config = build_backtest_config(&adapter)?;
    let symbols = resolve_symbols(code_override, &adapter)?;

    eprintln!("\nBacktest:");
    eprintln!("  window:           {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!("  capital per fill: {:.2}", bt_config.params.capital_per_fill);
    eprintln!("  context window:   {}", bt_config.params.context_window);
    eprintln!("  threads:          {}", bt_config.threads);

    eprintln!("\nUniverse:");
    eprintln!("  symbols: {}", symbols.join(", "));

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), DipbuyerError> {
    let config = load_config(config_path)?;
    let provider = build_provider(&config)?;
    let symbols = provider.list_symbols()?;

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for s in &symbols {
            println!("{}", s);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), DipbuyerError> {
    let config = load_config(config_path)?;
    validate_run_config(&config)?;
    let symbols = resolve_symbols(None, &config)?;
    eprintln!("Config validated successfully ({} symbols)", symbols.len());
    Ok(())
}
