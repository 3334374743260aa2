//! Indicator provider port.

use crate::domain::bar::DailyBar;
use crate::domain::error::DipbuyerError;
use chrono::NaiveDate;

/// Source of daily bars with precomputed RSI(10), EMA(9) and EMA(200).
///
/// Implementations resolve any provider-specific field naming; the domain only
/// ever sees [`DailyBar`]. Bars are returned in strictly increasing date order.
pub trait IndicatorProvider {
    fn get_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, DipbuyerError>;

    fn list_symbols(&self) -> Result<Vec<String>, DipbuyerError>;
}
