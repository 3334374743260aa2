//! Multi-symbol batch runs.
//!
//! Every symbol is an independent pass with private state, so symbols run on a
//! rayon pool without locks. Cancellation is checked once, at the start of each
//! symbol; a pass that has started always runs to completion.

use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use super::backtest::{BacktestConfig, BacktestResult, run_backtest};
use super::bar::DailyBar;
use super::error::DipbuyerError;
use super::metrics::Summary;
use crate::ports::data_port::IndicatorProvider;
use crate::ports::validator_port::EntryValidator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Completed symbols, in input order.
    pub results: Vec<BacktestResult>,
    pub failures: Vec<SymbolFailure>,
    /// Symbols never started because the batch was cancelled.
    pub cancelled: Vec<String>,
    /// Aggregate over every closed (and still-open) position in `results`.
    pub summary: Summary,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<SymbolOutcome>) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled = Vec::new();

        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Completed(result) => results.push(result),
                SymbolOutcome::Failed(failure) => failures.push(failure),
                SymbolOutcome::Cancelled(symbol) => cancelled.push(symbol),
            }
        }

        let summary = Summary::compute(
            results.iter().flat_map(|r| r.positions.iter()),
            results
                .iter()
                .filter_map(|r| r.open_position.as_ref().zip(r.last_close)),
        );

        BatchReport {
            results,
            failures,
            cancelled,
            summary,
        }
    }

    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Completed(BacktestResult),
    Failed(SymbolFailure),
    Cancelled(String),
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn failure(symbol: &str, err: &DipbuyerError) -> SymbolOutcome {
    tracing::warn!(symbol, error = %err, "symbol failed");
    SymbolOutcome::Failed(SymbolFailure {
        symbol: symbol.to_string(),
        reason: err.to_string(),
    })
}

/// Run one symbol: fetch its bars once, then make a single pass.
fn run_symbol(
    symbol: &str,
    provider: &(dyn IndicatorProvider + Sync),
    validator: &(dyn EntryValidator + Sync),
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> SymbolOutcome {
    if is_cancelled(cancel) {
        return SymbolOutcome::Cancelled(symbol.to_string());
    }

    let bars = match provider.get_bars(symbol, config.start_date, config.end_date) {
        Ok(bars) => bars,
        Err(e) => return failure(symbol, &e),
    };

    run_loaded(symbol, &bars, validator, config)
}

fn run_loaded(
    symbol: &str,
    bars: &[DailyBar],
    validator: &(dyn EntryValidator + Sync),
    config: &BacktestConfig,
) -> SymbolOutcome {
    match run_backtest(symbol, bars, validator, &config.params) {
        Ok(result) => {
            tracing::info!(
                symbol,
                closed = result.positions.len(),
                win_rate = result.summary.win_rate,
                "symbol complete"
            );
            SymbolOutcome::Completed(result)
        }
        Err(e) => failure(symbol, &e),
    }
}

fn in_pool<T, F>(threads: usize, work: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if threads == 0 {
        return work();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(work),
        Err(e) => {
            tracing::warn!(threads, error = %e, "could not build thread pool; using global pool");
            work()
        }
    }
}

/// Fetch and backtest every symbol in parallel.
pub fn run_batch(
    provider: &(dyn IndicatorProvider + Sync),
    symbols: &[String],
    validator: &(dyn EntryValidator + Sync),
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> BatchReport {
    tracing::info!(symbols = symbols.len(), threads = config.threads, "starting batch");

    let outcomes: Vec<SymbolOutcome> = in_pool(config.threads, || {
        symbols
            .par_iter()
            .map(|symbol| run_symbol(symbol, provider, validator, config, cancel))
            .collect()
    });

    let report = BatchReport::from_outcomes(outcomes);
    tracing::info!(
        completed = report.results.len(),
        failed = report.failures.len(),
        cancelled = report.cancelled.len(),
        "batch finished"
    );
    report
}

/// Backtest symbols whose bars are already loaded.
pub fn run_batch_on_data(
    data: &[(String, Vec<DailyBar>)],
    validator: &(dyn EntryValidator + Sync),
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> BatchReport {
    let outcomes: Vec<SymbolOutcome> = in_pool(config.threads, || {
        data.par_iter()
            .map(|(symbol, bars)| {
                if is_cancelled(cancel) {
                    SymbolOutcome::Cancelled(symbol.clone())
                } else {
                    run_loaded(symbol, bars, validator, config)
                }
            })
            .collect()
    });
    BatchReport::from_outcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ValidatorError;
    use crate::domain::signal::{EntrySignal, Verdict};
    use crate::domain::state_machine::SimulationParams;
    use chrono::NaiveDate;

    struct AcceptAll;

    impl EntryValidator for AcceptAll {
        fn validate_entry(&self, _signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
            Ok(Verdict::Accept)
        }
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            params: SimulationParams::default(),
            threads: 2,
        }
    }

    fn flat_bars(n: u32) -> Vec<DailyBar> {
        (1..=n)
            .map(|d| DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0,
                volume: 100,
                rsi10: Some(45.0),
                ema9: Some(10.0),
                ema200: Some(9.0),
            })
            .collect()
    }

    #[test]
    fn failed_symbol_does_not_abort_batch() {
        let data = vec![
            ("GOOD".to_string(), flat_bars(5)),
            ("EMPTY".to_string(), vec![]),
            ("ALSO".to_string(), flat_bars(3)),
        ];
        let report = run_batch_on_data(&data, &AcceptAll, &config(), None);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].symbol, "GOOD");
        assert_eq!(report.results[1].symbol, "ALSO");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "EMPTY");
        assert!(report.failures[0].reason.contains("insufficient history"));
        assert!(!report.was_cancelled());
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let data = vec![
            ("A".to_string(), flat_bars(5)),
            ("B".to_string(), flat_bars(5)),
        ];
        let cancel = AtomicBool::new(true);
        let report = run_batch_on_data(&data, &AcceptAll, &config(), Some(&cancel));
        assert!(report.results.is_empty());
        assert_eq!(report.cancelled, vec!["A".to_string(), "B".to_string()]);
        assert!(report.was_cancelled());
    }
}
