//! Outcome tracking: adverse excursion and exit bookkeeping on the active position.
//!
//! These functions only touch derived fields; they never decide transitions.

use chrono::NaiveDate;

use super::position::{ExitReason, Position, PositionStatus};

/// Unrealised P&L of the bar's low against the average entry price, as a fraction.
pub fn adverse_excursion(position: &Position, bar_low: f64) -> f64 {
    let avg = position.average_price();
    if avg > 0.0 { (bar_low - avg) / avg } else { 0.0 }
}

/// Fold one bar's low into the running maximum adverse excursion.
pub fn observe_low(position: &mut Position, bar_low: f64) {
    if !position.is_open() {
        return;
    }
    let excursion = adverse_excursion(position, bar_low);
    position.max_drawdown_pct = position.max_drawdown_pct.min(excursion);
}

/// Freeze the position at its exit.
pub fn finalize(position: &mut Position, exit_date: NaiveDate, exit_price: f64, reason: ExitReason) {
    position.status = PositionStatus::Closed;
    position.exit_date = Some(exit_date);
    position.exit_price = Some(exit_price);
    position.exit_reason = Some(reason);
    position.days_to_exit = Some((exit_date - position.first_fill_date()).num_days());
}
