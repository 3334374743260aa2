//! JSON batch report.
//!
//! Serializes the whole `BatchReport`. Field order follows the struct
//! definitions, so identical runs produce byte-identical files.

use crate::domain::batch::BatchReport;
use crate::domain::error::DipbuyerError;
use crate::ports::report_port::ReportPort;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, report: &BatchReport) -> Result<String, DipbuyerError> {
        serde_json::to_string_pretty(report).map_err(|e| DipbuyerError::Report {
            reason: format!("failed to serialize report to JSON: {}", e),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BatchReport, output_path: &Path) -> Result<(), DipbuyerError> {
        let json = self.render(report)?;
        std::fs::write(output_path, json)?;
        tracing::info!(path = %output_path.display(), "wrote JSON report");
        Ok(())
    }
}
