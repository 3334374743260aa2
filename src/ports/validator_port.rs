//! Entry validator port.
//!
//! Consulted for initial entries only. Any error is a rejection.

use crate::domain::error::ValidatorError;
use crate::domain::signal::{EntrySignal, Verdict};

pub trait EntryValidator {
    fn validate_entry(&self, signal: &EntrySignal) -> Result<Verdict, ValidatorError>;
}

impl<V: EntryValidator + ?Sized> EntryValidator for &V {
    fn validate_entry(&self, signal: &EntrySignal) -> Result<Verdict, ValidatorError> {
        (**self).validate_entry(signal)
    }
}
