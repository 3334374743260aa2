//! Per-symbol backtest: one chronological pass through the state machine.
//!
//! BacktestConfig holds the run-wide parameters shared by every symbol.

use chrono::NaiveDate;
use serde::Serialize;

use super::bar::DailyBar;
use super::error::DipbuyerError;
use super::metrics::Summary;
use super::position::Position;
use super::signal::SignalCounts;
use super::state_machine::{Event, PositionStateMachine, SimulationParams};
use crate::ports::validator_port::EntryValidator;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub params: SimulationParams,
    /// Worker threads for batch runs; 0 uses the rayon default.
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    /// Closed positions in the order they closed.
    pub positions: Vec<Position>,
    /// Position still running at the end of the window, never force-closed.
    pub open_position: Option<Position>,
    /// Close of the last valid bar, used to mark `open_position`.
    pub last_close: Option<f64>,
    pub signals: SignalCounts,
    pub re_entries: usize,
    pub bars_processed: usize,
    pub skipped_days: usize,
    pub summary: Summary,
}

/// Run one symbol's full bar sequence.
///
/// Fails only when the sequence is empty or no bar carries every indicator;
/// all per-day anomalies are skipped and counted.
pub fn run_backtest(
    symbol: &str,
    bars: &[DailyBar],
    validator: &dyn EntryValidator,
    params: &SimulationParams,
) -> Result<BacktestResult, DipbuyerError> {
    let usable = bars.iter().filter(|b| b.is_complete()).count();
    if usable == 0 {
        return Err(DipbuyerError::InsufficientHistory {
            symbol: symbol.to_string(),
            bars: bars.len(),
            usable,
        });
    }

    let mut machine = PositionStateMachine::new(symbol, params.clone(), validator);
    let mut positions = Vec::new();
    let mut signals = SignalCounts::default();
    let mut re_entries = 0usize;
    let mut skipped_days = 0usize;
    let mut last_close = None;

    for bar in bars {
        let mut skipped = false;
        for event in machine.step(bar) {
            match event {
                Event::BarSkipped { .. } => {
                    skipped = true;
                    skipped_days += 1;
                }
                Event::SignalDetected { .. } => signals.detected += 1,
                Event::SignalAccepted { .. } => signals.validated += 1,
                Event::SignalSkipped { .. } => signals.skipped += 1,
                Event::EntryFilled { .. } => signals.executed += 1,
                Event::ReentryFilled { .. } => re_entries += 1,
                Event::Exited { position } => positions.push(position),
                Event::Hold { .. }
                | Event::ReentryRejected { .. }
                | Event::InsufficientCapital { .. } => {}
            }
        }
        if !skipped {
            last_close = Some(bar.close);
        }
    }

    let open_position = machine.into_open_position();
    let summary = Summary::compute(&positions, open_position.as_ref().zip(last_close));

    tracing::debug!(
        symbol,
        closed = positions.len(),
        open = open_position.is_some(),
        skipped_days,
        "backtest pass complete"
    );

    Ok(BacktestResult {
        symbol: symbol.to_string(),
        positions,
        open_position,
        last_close,
        signals,
        re_entries,
        bars_processed: bars.len() - skipped_days,
        skipped_days,
        summary,
    })
}
