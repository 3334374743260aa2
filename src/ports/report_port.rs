//! Report generation port.

use crate::domain::batch::BatchReport;
use crate::domain::error::DipbuyerError;
use std::path::Path;

/// Port for writing batch results.
pub trait ReportPort {
    fn write(&self, report: &BatchReport, output_path: &Path) -> Result<(), DipbuyerError>;
}
