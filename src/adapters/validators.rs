//! Entry validator implementations.
//!
//! `TimeoutValidator` wraps any validator so a slow or hung call is turned into
//! a rejection instead of stalling the symbol's pass.

use crate::domain::error::ValidatorError;
use crate::domain::signal::{EntrySignal, Verdict};
use crate::ports::validator_port::EntryValidator;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Accepts every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllValidator;

impl EntryValidator for AcceptAllValidator {
    fn validate_entry(&self, _signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
        Ok(Verdict::Accept)
    }
}

/// Rejects signals whose context window trades too thinly.
#[derive(Debug, Clone, Copy)]
pub struct VolumeFilterValidator {
    pub min_avg_volume: f64,
}

impl VolumeFilterValidator {
    pub fn new(min_avg_volume: f64) -> Self {
        Self { min_avg_volume }
    }
}

impl EntryValidator for VolumeFilterValidator {
    fn validate_entry(&self, signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
        let avg = signal.average_volume();
        if avg < self.min_avg_volume {
            tracing::debug!(
                symbol = %signal.symbol,
                date = %signal.date,
                avg_volume = avg,
                min = self.min_avg_volume,
                "volume filter rejected signal"
            );
            return Ok(Verdict::Reject);
        }
        Ok(Verdict::Accept)
    }
}

/// Bounds each call to the inner validator.
///
/// The inner call runs on its own thread. A call that misses the deadline is
/// abandoned: its thread finishes in the background and the answer is dropped.
/// At most `max_in_flight` helper threads exist at once; while that many are
/// still running, further calls fail as unavailable without spawning.
pub struct TimeoutValidator<V> {
    inner: Arc<V>,
    timeout: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

/// Default cap on helper threads that are still running. Well above typical
/// worker pool size, so only abandoned calls can reach it.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

impl<V> TimeoutValidator<V>
where
    V: EntryValidator + Send + Sync + 'static,
{
    pub fn new(inner: V, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

/// Releases one in-flight slot when the helper thread ends, panic included.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<V> EntryValidator for TimeoutValidator<V>
where
    V: EntryValidator + Send + Sync + 'static,
{
    fn validate_entry(&self, signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) >= self.max_in_flight {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                symbol = %signal.symbol,
                date = %signal.date,
                max_in_flight = self.max_in_flight,
                "validator saturated by unfinished calls"
            );
            return Err(ValidatorError::Unavailable {
                reason: format!("{} validator calls still running", self.max_in_flight),
            });
        }
        let slot = SlotGuard(Arc::clone(&self.in_flight));

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = signal.clone();

        thread::Builder::new()
            .name(format!("validator-{}", signal.symbol))
            .spawn(move || {
                let _slot = slot;
                // Receiver may be gone after a timeout.
                let _ = tx.send(inner.validate_entry(&owned));
            })
            .map_err(|e| ValidatorError::Unavailable {
                reason: format!("failed to spawn validator thread: {}", e),
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(
                    symbol = %signal.symbol,
                    date = %signal.date,
                    timeout_ms,
                    "validator timed out"
                );
                Err(ValidatorError::Timeout { timeout_ms })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ValidatorError::Unavailable {
                reason: "validator thread exited without answering".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::DailyBar;
    use chrono::NaiveDate;

    fn signal(volumes: &[i64]) -> EntrySignal {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        EntrySignal {
            symbol: "TEST".into(),
            date,
            close: 101.0,
            rsi10: 25.0,
            ema9: 103.0,
            ema200: 95.0,
            recent_bars: volumes
                .iter()
                .map(|&volume| DailyBar {
                    date,
                    open: 100.0,
                    high: 102.0,
                    low: 99.0,
                    close: 101.0,
                    volume,
                    rsi10: Some(25.0),
                    ema9: Some(103.0),
                    ema200: Some(95.0),
                })
                .collect(),
        }
    }

    struct Slow(Duration);

    impl EntryValidator for Slow {
        fn validate_entry(&self, _signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
            thread::sleep(self.0);
            Ok(Verdict::Accept)
        }
    }

    struct Refuses;

    impl EntryValidator for Refuses {
        fn validate_entry(&self, _signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
            Err(ValidatorError::Unavailable {
                reason: "offline".into(),
            })
        }
    }

    #[test]
    fn accept_all_accepts() {
        assert_eq!(
            AcceptAllValidator.validate_entry(&signal(&[])),
            Ok(Verdict::Accept)
        );
    }

    #[test]
    fn volume_filter_threshold() {
        let v = VolumeFilterValidator::new(1_000.0);
        assert_eq!(
            v.validate_entry(&signal(&[500, 1_500])),
            Ok(Verdict::Accept)
        );
        assert_eq!(v.validate_entry(&signal(&[500, 900])), Ok(Verdict::Reject));
        assert_eq!(v.validate_entry(&signal(&[])), Ok(Verdict::Reject));
    }

    #[test]
    fn timeout_passes_fast_answer_through() {
        let v = TimeoutValidator::new(AcceptAllValidator, Duration::from_secs(5));
        assert_eq!(v.validate_entry(&signal(&[1])), Ok(Verdict::Accept));
    }

    #[test]
    fn timeout_passes_inner_error_through() {
        let v = TimeoutValidator::new(Refuses, Duration::from_secs(5));
        assert!(matches!(
            v.validate_entry(&signal(&[1])),
            Err(ValidatorError::Unavailable { .. })
        ));
    }

    #[test]
    fn slow_validator_times_out() {
        let v = TimeoutValidator::new(Slow(Duration::from_millis(500)), Duration::from_millis(20));
        assert_eq!(
            v.validate_entry(&signal(&[1])),
            Err(ValidatorError::Timeout { timeout_ms: 20 })
        );
    }

    #[test]
    fn hung_calls_cap_helper_threads() {
        let v = TimeoutValidator::new(Slow(Duration::from_millis(500)), Duration::from_millis(20))
            .with_max_in_flight(1);
        assert_eq!(
            v.validate_entry(&signal(&[1])),
            Err(ValidatorError::Timeout { timeout_ms: 20 })
        );
        // The first helper is still sleeping, so no second thread is spawned.
        assert!(matches!(
            v.validate_entry(&signal(&[1])),
            Err(ValidatorError::Unavailable { .. })
        ));
    }

    #[test]
    fn finished_calls_release_their_slot() {
        let v = TimeoutValidator::new(AcceptAllValidator, Duration::from_secs(5))
            .with_max_in_flight(1);
        for _ in 0..3 {
            assert_eq!(v.validate_entry(&signal(&[1])), Ok(Verdict::Accept));
            // The answer can arrive before the helper drops its slot.
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while v.in_flight.load(Ordering::SeqCst) > 0 && std::time::Instant::now() < deadline {
                thread::yield_now();
            }
        }
    }
}
