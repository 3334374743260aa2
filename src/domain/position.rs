//! Position lifecycle: fills, derived prices, exit bookkeeping.

use chrono::NaiveDate;
use serde::Serialize;

use super::ladder::LevelLadder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillTag {
    Initial,
    ReEntry,
}

/// One executed trade leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: i64,
    pub tag: FillTag,
}

impl Fill {
    pub fn cost(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    TargetHit,
    RsiExit,
}

/// A long position built from one initial fill and any number of re-entries.
///
/// `max_drawdown_pct` is the most negative `(low - average_price) / average_price`
/// seen while open, as a fraction (0.0 when price never traded below cost).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub fills: Vec<Fill>,
    pub target_price: f64,
    pub ladder: LevelLadder,
    pub status: PositionStatus,
    pub max_drawdown_pct: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub days_to_exit: Option<i64>,
}

impl Position {
    pub fn open(symbol: &str, fill: Fill, target_price: f64, ladder: LevelLadder) -> Self {
        Position {
            symbol: symbol.to_string(),
            fills: vec![fill],
            target_price,
            ladder,
            status: PositionStatus::Open,
            max_drawdown_pct: 0.0,
            exit_date: None,
            exit_price: None,
            exit_reason: None,
            days_to_exit: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn total_quantity(&self) -> i64 {
        self.fills.iter().map(|f| f.quantity).sum()
    }

    /// Sum of price * quantity over all fills (capital deployed).
    pub fn cost_basis(&self) -> f64 {
        self.fills.iter().map(Fill::cost).sum()
    }

    /// Quantity-weighted mean fill price.
    pub fn average_price(&self) -> f64 {
        let qty = self.total_quantity();
        if qty == 0 {
            return 0.0;
        }
        self.cost_basis() / qty as f64
    }

    pub fn first_fill_date(&self) -> NaiveDate {
        self.fills[0].date
    }

    pub fn re_entry_count(&self) -> usize {
        self.fills
            .iter()
            .filter(|f| f.tag == FillTag::ReEntry)
            .count()
    }

    pub fn re_entries_on(&self, date: NaiveDate) -> usize {
        self.fills
            .iter()
            .filter(|f| f.tag == FillTag::ReEntry && f.date == date)
            .count()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.total_quantity() as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_basis()
    }

    /// Realised P&L; `None` while the position is still open.
    pub fn realized_pnl(&self) -> Option<f64> {
        self.exit_price.map(|price| self.unrealized_pnl(price))
    }

    /// Realised P&L as a fraction of capital deployed.
    pub fn return_pct(&self) -> Option<f64> {
        let basis = self.cost_basis();
        self.realized_pnl()
            .map(|pnl| if basis > 0.0 { pnl / basis } else { 0.0 })
    }

    pub(crate) fn add_fill(&mut self, fill: Fill, target_price: f64, ladder: LevelLadder) {
        self.fills.push(fill);
        self.target_price = target_price;
        self.ladder = ladder;
    }
}
