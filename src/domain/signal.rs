//! Initial-entry signals and the market context handed to a validator.

use chrono::NaiveDate;
use serde::Serialize;

use super::bar::DailyBar;
use super::ladder::ENTRY_RSI;

/// Snapshot passed to an entry validator. Owned so it can cross a thread boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySignal {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub rsi10: f64,
    pub ema9: f64,
    pub ema200: f64,
    /// Most recent valid bars up to and including the signal day, oldest first.
    pub recent_bars: Vec<DailyBar>,
}

impl EntrySignal {
    pub fn average_volume(&self) -> f64 {
        if self.recent_bars.is_empty() {
            return 0.0;
        }
        let total: i64 = self.recent_bars.iter().map(|b| b.volume).sum();
        total as f64 / self.recent_bars.len() as f64
    }
}

/// Oversold inside an uptrend: `rsi10 < 30` and `close > ema200`.
pub fn is_entry_signal(close: f64, rsi10: f64, ema200: f64) -> bool {
    rsi10 < ENTRY_RSI && close > ema200
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accept,
    Reject,
}

/// Per-symbol signal funnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalCounts {
    pub detected: usize,
    pub validated: usize,
    pub skipped: usize,
    pub executed: usize,
}
