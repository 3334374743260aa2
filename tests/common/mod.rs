#![allow(dead_code)]

use chrono::NaiveDate;
use dipbuyer::domain::backtest::BacktestConfig;
pub use dipbuyer::domain::bar::DailyBar;
use dipbuyer::domain::error::{DipbuyerError, ValidatorError};
use dipbuyer::domain::signal::{EntrySignal, Verdict};
use dipbuyer::domain::state_machine::SimulationParams;
use dipbuyer::ports::data_port::IndicatorProvider;
use dipbuyer::ports::validator_port::EntryValidator;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockProvider {
    pub data: HashMap<String, Vec<DailyBar>>,
    pub errors: HashMap<String, String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<DailyBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl IndicatorProvider for MockProvider {
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipbuyerError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(DipbuyerError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).ok_or_else(|| DipbuyerError::NoData {
            symbol: symbol.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, DipbuyerError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Accepts everything except the scripted (symbol, date) pairs, which are
/// rejected or fail. Counts every call.
pub struct ScriptedValidator {
    pub rejects: Vec<(String, NaiveDate)>,
    pub failures: Vec<(String, NaiveDate)>,
    pub calls: AtomicUsize,
}

impl ScriptedValidator {
    pub fn accept_all() -> Self {
        Self {
            rejects: Vec::new(),
            failures: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self, symbol: &str, date: NaiveDate) -> Self {
        self.rejects.push((symbol.to_string(), date));
        self
    }

    pub fn failing(mut self, symbol: &str, date: NaiveDate) -> Self {
        self.failures.push((symbol.to_string(), date));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EntryValidator for ScriptedValidator {
    fn validate_entry(&self, signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = (signal.symbol.clone(), signal.date);
        if self.failures.contains(&key) {
            return Err(ValidatorError::Unavailable {
                reason: "scripted failure".into(),
            });
        }
        if self.rejects.contains(&key) {
            return Ok(Verdict::Reject);
        }
        Ok(Verdict::Accept)
    }
}

pub fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
}

/// A bar that trades flat at `close`, well inside an uptrend, with a target
/// far enough away that it is never touched unless a test says so.
pub fn bar(n: i64, close: f64, rsi: f64) -> DailyBar {
    DailyBar {
        date: day(n),
        open: close,
        high: close,
        low: close,
        close,
        volume: 100_000,
        rsi10: Some(rsi),
        ema9: Some(close * 2.0),
        ema200: Some(close * 0.5),
    }
}

pub trait BarExt {
    fn open(self, v: f64) -> Self;
    fn high(self, v: f64) -> Self;
    fn low(self, v: f64) -> Self;
    fn ema9(self, v: f64) -> Self;
    fn ema200(self, v: f64) -> Self;
    fn volume(self, v: i64) -> Self;
}

impl BarExt for DailyBar {
    fn open(self, v: f64) -> Self {
        DailyBar { open: v, ..self }
    }
    fn high(self, v: f64) -> Self {
        DailyBar { high: v, ..self }
    }
    fn low(self, v: f64) -> Self {
        DailyBar { low: v, ..self }
    }
    fn ema9(self, v: f64) -> Self {
        DailyBar {
            ema9: Some(v),
            ..self
        }
    }
    fn ema200(self, v: f64) -> Self {
        DailyBar {
            ema200: Some(v),
            ..self
        }
    }
    fn volume(self, v: i64) -> Self {
        DailyBar { volume: v, ..self }
    }
}

pub fn params(capital_per_fill: f64) -> SimulationParams {
    SimulationParams {
        capital_per_fill,
        context_window: 5,
    }
}

pub fn config(threads: usize) -> BacktestConfig {
    BacktestConfig {
        start_date: day(0),
        end_date: day(365),
        params: params(1_000.0),
        threads,
    }
}
