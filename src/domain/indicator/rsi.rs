//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! Warmup: the first n values are `None`.

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || closes.len() < 2 {
        return vec![None; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(None);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = i; // number of changes seen so far

        if n < period {
            avg_gain += gain;
            avg_loss += loss;
            values.push(None);
            continue;
        }

        if n == period {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(Some(rsi));
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_and_single() {
        assert!(calculate_rsi(&[], 10).is_empty());
        assert_eq!(calculate_rsi(&[100.0], 10), vec![None]);
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + (i % 3) as f64).collect();
        let series = calculate_rsi(&closes, 10);
        for v in &series[..10] {
            assert!(v.is_none());
        }
        assert!(series[10].is_some());
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&closes, 10);
        assert!((series[10].unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (0..11).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&closes, 10);
        assert!(series[10].unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + ((i % 7) as f64 - 3.0) * 2.0).collect();
        for v in calculate_rsi(&closes, 10).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_zero_period() {
        assert_eq!(calculate_rsi(&[1.0, 2.0], 0), vec![None, None]);
    }
}
