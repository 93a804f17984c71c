//! Winter pool reports.
//!
//! Two artifacts are derived from the processed folder: an index for
//! people and a summary table for spreadsheets. Both are rendered from
//! the same [`PoolRecord`] rows, sorted by surname.

pub mod index;
pub mod summary;

use thiserror::Error;

/// Errors that can occur while rendering report artifacts.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Writing a summary row failed.
    #[error("Failed to write summary row: {0}")]
    Csv(#[from] csv::Error),

    /// The summary writer could not be finalized.
    #[error("Failed to finish summary: {0}")]
    Finish(String),
}

/// One fully processed applicant document, as shown in reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    pub personal_id: String,
    pub name: String,

    /// View link of the applicant PDF, when the store provided one.
    pub document_link: Option<String>,

    /// View link of the recognized text companion.
    pub text_link: Option<String>,
}

impl PoolRecord {
    /// Report sort key: the last whitespace-delimited token of the name.
    pub fn surname(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or("")
    }
}

/// Renders report artifacts from pool records.
pub trait ReportRenderer: Send + Sync {
    fn render_index(&self, records: &[PoolRecord]) -> Result<Vec<u8>, RenderError>;
    fn render_summary(&self, records: &[PoolRecord]) -> Result<Vec<u8>, RenderError>;
}

/// Default renderer: HTML index, CSV summary.
pub struct StandardRenderer;

impl ReportRenderer for StandardRenderer {
    fn render_index(&self, records: &[PoolRecord]) -> Result<Vec<u8>, RenderError> {
        Ok(index::render_index(records))
    }

    fn render_summary(&self, records: &[PoolRecord]) -> Result<Vec<u8>, RenderError> {
        summary::render_summary(records)
    }
}
