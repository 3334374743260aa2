//! CSV position report.
//!
//! One row per position: every closed position of every symbol in input
//! order, then still-open positions marked at their symbol's last close.
//! Symbols that failed are listed after the positions with a `FAILED` status.

use crate::domain::backtest::BacktestResult;
use crate::domain::batch::BatchReport;
use crate::domain::error::DipbuyerError;
use crate::domain::position::{ExitReason, Position};
use crate::ports::report_port::ReportPort;
use std::path::Path;

const HEADER: [&str; 15] = [
    "symbol",
    "status",
    "entry_date",
    "entry_price",
    "re_entries",
    "quantity",
    "avg_price",
    "cost_basis",
    "target_price",
    "exit_date",
    "exit_price",
    "exit_reason",
    "days_to_exit",
    "max_drawdown_pct",
    "pnl",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Render the report as CSV text.
    pub fn render(&self, report: &BatchReport) -> Result<String, DipbuyerError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(HEADER).map_err(report_err)?;

        for result in &report.results {
            for position in &result.positions {
                wtr.write_record(closed_row(position)).map_err(report_err)?;
            }
        }
        for result in &report.results {
            if let Some(row) = open_row(result) {
                wtr.write_record(row).map_err(report_err)?;
            }
        }
        for failure in &report.failures {
            let mut row = vec![String::new(); HEADER.len()];
            row[0] = failure.symbol.clone();
            row[1] = "FAILED".to_string();
            row[11] = failure.reason.clone();
            wtr.write_record(row).map_err(report_err)?;
        }

        let data = wtr.into_inner().map_err(|e| DipbuyerError::Report {
            reason: format!("failed to flush CSV writer: {}", e),
        })?;
        String::from_utf8(data).map_err(|e| DipbuyerError::Report {
            reason: format!("CSV output is not valid UTF-8: {}", e),
        })
    }
}

fn report_err(e: csv::Error) -> DipbuyerError {
    DipbuyerError::Report {
        reason: format!("CSV write error: {}", e),
    }
}

fn exit_reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::TargetHit => "TARGET_HIT",
        ExitReason::RsiExit => "RSI_EXIT",
    }
}

fn common_fields(position: &Position) -> Vec<String> {
    vec![
        position.symbol.clone(),
        String::new(),
        position.first_fill_date().to_string(),
        format!("{:.4}", position.fills[0].price),
        position.re_entry_count().to_string(),
        position.total_quantity().to_string(),
        format!("{:.4}", position.average_price()),
        format!("{:.2}", position.cost_basis()),
        format!("{:.4}", position.target_price),
    ]
}

fn closed_row(position: &Position) -> Vec<String> {
    let mut row = common_fields(position);
    row[1] = "CLOSED".to_string();
    row.push(position.exit_date.map(|d| d.to_string()).unwrap_or_default());
    row.push(
        position
            .exit_price
            .map(|p| format!("{:.4}", p))
            .unwrap_or_default(),
    );
    row.push(
        position
            .exit_reason
            .map(exit_reason_label)
            .unwrap_or_default()
            .to_string(),
    );
    row.push(
        position
            .days_to_exit
            .map(|d| d.to_string())
            .unwrap_or_default(),
    );
    row.push(format!("{:.4}", position.max_drawdown_pct));
    row.push(
        position
            .realized_pnl()
            .map(|p| format!("{:.2}", p))
            .unwrap_or_default(),
    );
    row
}

fn open_row(result: &BacktestResult) -> Option<Vec<String>> {
    let (position, mark) = result.open_position.as_ref().zip(result.last_close)?;
    let mut row = common_fields(position);
    row[1] = "OPEN".to_string();
    row.extend([String::new(), String::new(), String::new(), String::new()]);
    row.push(format!("{:.4}", position.max_drawdown_pct));
    row.push(format!("{:.2}", position.unrealized_pnl(mark)));
    Some(row)
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BatchReport, output_path: &Path) -> Result<(), DipbuyerError> {
        let content = self.render(report)?;
        std::fs::write(output_path, content)?;
        tracing::info!(path = %output_path.display(), "wrote CSV report");
        Ok(())
    }
}
