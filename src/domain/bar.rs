//! Daily bar with precomputed indicators.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::MalformedBarError;

/// One trading day as delivered by an indicator provider.
///
/// Indicator fields are `None` during warm-up or when the provider could not
/// supply them; such a day is malformed and never produces a signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub rsi10: Option<f64>,
    pub ema9: Option<f64>,
    pub ema200: Option<f64>,
}

/// The indicator values of a bar that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicators {
    pub rsi10: f64,
    pub ema9: f64,
    pub ema200: f64,
}

impl DailyBar {
    /// Check every numeric field, returning the indicator triple when all are present.
    pub fn validate(&self) -> Result<Indicators, MalformedBarError> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() {
                return Err(self.malformed(field));
            }
        }

        Ok(Indicators {
            rsi10: self.require(self.rsi10, "rsi10")?,
            ema9: self.require(self.ema9, "ema9")?,
            ema200: self.require(self.ema200, "ema200")?,
        })
    }

    /// True when open, high, low and close are all finite.
    pub fn has_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    fn require(&self, value: Option<f64>, field: &'static str) -> Result<f64, MalformedBarError> {
        match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(self.malformed(field)),
        }
    }

    fn malformed(&self, field: &'static str) -> MalformedBarError {
        MalformedBarError {
            date: self.date,
            field,
        }
    }
}
