//! Indicator series used by providers that only have raw OHLCV data.
//!
//! The simulation never calls these; a provider derives RSI(10), EMA(9) and
//! EMA(200) once, at the data boundary. Warm-up bars carry `None`.

pub mod ema;
pub mod rsi;

use crate::domain::bar::DailyBar;

pub const RSI_PERIOD: usize = 10;
pub const FAST_EMA_PERIOD: usize = 9;
pub const SLOW_EMA_PERIOD: usize = 200;

/// Fill the indicator fields of `bars` (chronological) from their closes.
///
/// Bars with a non-finite close are left out of the series and get no
/// indicators; the series resumes from the previous finite close.
pub fn enrich(bars: &mut [DailyBar]) {
    let finite: Vec<usize> = (0..bars.len())
        .filter(|&i| bars[i].close.is_finite())
        .collect();
    let closes: Vec<f64> = finite.iter().map(|&i| bars[i].close).collect();
    let rsi = rsi::calculate_rsi(&closes, RSI_PERIOD);
    let fast = ema::calculate_ema(&closes, FAST_EMA_PERIOD);
    let slow = ema::calculate_ema(&closes, SLOW_EMA_PERIOD);

    for bar in bars.iter_mut() {
        bar.rsi10 = None;
        bar.ema9 = None;
        bar.ema200 = None;
    }
    for (k, &i) in finite.iter().enumerate() {
        bars[i].rsi10 = rsi[k];
        bars[i].ema9 = fast[k];
        bars[i].ema200 = slow[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn enrich_leaves_warmup_empty() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut bars: Vec<DailyBar> = (0..210)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                DailyBar {
                    date: start + chrono::Duration::days(i),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000,
                    rsi10: None,
                    ema9: None,
                    ema200: None,
                }
            })
            .collect();

        enrich(&mut bars);

        assert!(bars[9].rsi10.is_none());
        assert!(bars[10].rsi10.is_some());
        assert!(bars[7].ema9.is_none());
        assert!(bars[8].ema9.is_some());
        assert!(bars[198].ema200.is_none());
        assert!(bars[199].ema200.is_some());
        assert!(!bars[198].is_complete());
        assert!(bars[209].is_complete());
    }

    #[test]
    fn enrich_skips_non_finite_close() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut bars: Vec<DailyBar> = (0..260)
            .map(|i| {
                let close = if i == 5 {
                    f64::NAN
                } else {
                    100.0 + (i as f64 * 0.3).sin() * 4.0
                };
                DailyBar {
                    date: start + chrono::Duration::days(i),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000,
                    rsi10: None,
                    ema9: None,
                    ema200: None,
                }
            })
            .collect();

        enrich(&mut bars);

        assert!(bars[5].rsi10.is_none());
        assert!(bars[5].ema9.is_none());
        assert!(bars[5].ema200.is_none());
        // One close dropped: warm-up ends one bar later.
        assert!(bars[199].ema200.is_none());
        assert!(bars[200].ema200.is_some());
        for bar in &bars[200..] {
            assert!(bar.is_complete());
            assert!(bar.ema9.unwrap().is_finite());
            assert!(bar.ema200.unwrap().is_finite());
            assert!(bar.rsi10.unwrap().is_finite());
        }
    }
}
