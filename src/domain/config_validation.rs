//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::error::DipbuyerError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const VALIDATOR_KINDS: &[&str] = &["accept_all", "volume"];
pub const REPORT_FORMATS: &[&str] = &["csv", "json"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    validate_dates(config)?;
    validate_codes(config)?;
    validate_capital_per_fill(config)?;
    validate_context_window(config)?;
    validate_threads(config)?;
    Ok(())
}

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    validate_backtest_config(config)?;
    validate_data_dir(config)?;
    validate_validator(config)?;
    validate_report(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> DipbuyerError {
    DipbuyerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> DipbuyerError {
    DipbuyerError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn validate_capital_per_fill(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let value = config.get_double("backtest", "capital_per_fill", 10_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "backtest",
            "capital_per_fill",
            "capital_per_fill must be positive",
        ));
    }
    Ok(())
}

fn validate_context_window(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let value = config.get_int("backtest", "context_window", 20);
    if value < 1 {
        return Err(invalid(
            "backtest",
            "context_window",
            "context_window must be at least 1",
        ));
    }
    Ok(())
}

fn validate_threads(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let value = config.get_int("backtest", "threads", 0);
    if value < 0 {
        return Err(invalid("backtest", "threads", "threads must be non-negative"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, DipbuyerError> {
    match value {
        None => Err(missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let codes = config.get_string("backtest", "codes");
    let code = config.get_string("backtest", "code");

    match (codes, code) {
        (Some(c), _) if !c.trim().is_empty() => Ok(()),
        (None, Some(c)) if !c.trim().is_empty() => Ok(()),
        _ => Err(missing("backtest", "code")),
    }
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(missing("data", "dir")),
    }
}

fn validate_validator(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let kind = config
        .get_string("validator", "kind")
        .unwrap_or_else(|| "accept_all".to_string());
    if !VALIDATOR_KINDS.contains(&kind.trim()) {
        return Err(invalid(
            "validator",
            "kind",
            "kind must be one of: accept_all, volume",
        ));
    }

    let min_volume = config.get_double("validator", "min_avg_volume", 0.0);
    if !min_volume.is_finite() || min_volume < 0.0 {
        return Err(invalid(
            "validator",
            "min_avg_volume",
            "min_avg_volume must be non-negative",
        ));
    }

    let timeout = config.get_int("validator", "timeout_ms", 2_000);
    if timeout <= 0 {
        return Err(invalid(
            "validator",
            "timeout_ms",
            "timeout_ms must be positive",
        ));
    }
    Ok(())
}

fn validate_report(config: &dyn ConfigPort) -> Result<(), DipbuyerError> {
    let format = config
        .get_string("report", "format")
        .unwrap_or_else(|| "csv".to_string());
    if !REPORT_FORMATS.contains(&format.trim()) {
        return Err(invalid("report", "format", "format must be csv or json"));
    }
    Ok(())
}
