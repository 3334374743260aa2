//! Core domain types and logic.

pub mod bar;
pub mod ladder;
pub mod signal;
pub mod position;
pub mod outcome;
pub mod state_machine;
pub mod backtest;
pub mod batch;
pub mod metrics;
pub mod indicator;
pub mod universe;
pub mod config_validation;
pub mod error;
