use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// MIME type of applicant documents.
pub const MIME_PDF: &str = "application/pdf";

/// MIME type of recognized text companions.
pub const MIME_TEXT: &str = "text/plain";

/// MIME type of the rendered index report.
pub const MIME_HTML: &str = "text/html";

/// MIME type of the rendered summary report.
pub const MIME_CSV: &str = "text/csv";

/// Custom property keys stored on remote objects.
///
/// The properties are the only system of record the pipeline has: every
/// stage decides whether an object still needs work by looking at these
/// keys on a freshly listed object, never at cached state.
pub mod props {
    /// On an ingested copy: id of the original incoming document.
    pub const COPIED_FROM: &str = "copiedFrom";

    /// On an ingested copy: id of its recognized text companion.
    pub const OCR_TEXT_FILE_ID: &str = "ocrTextFileId";

    /// On a text companion: id of the PDF it was recognized from.
    pub const PDF_SOURCE_FILE_ID: &str = "pdfSourceFileId";

    /// Extracted applicant identifier.
    pub const UCAS_PERSONAL_ID: &str = "ucasPersonalId";

    /// How many identifier matches agreed on the winning value.
    pub const CONSISTENT_MATCH_COUNT: &str = "consistentMatchCount";

    /// Total identifier matches found in the text.
    pub const TOTAL_MATCH_COUNT: &str = "totalMatchCount";

    /// Extracted applicant name, or "Unknown".
    pub const EXTRACTED_NAME: &str = "extractedName";

    /// Marks the index report object.
    pub const IS_INDEX: &str = "isIndex";

    /// Marks the summary report object.
    pub const IS_SUMMARY: &str = "isSummary";

    /// Value written for marker properties. Only presence is ever tested.
    pub const MARKER: &str = "true";
}

/// A file in the remote object store, reduced to the fields the pipeline
/// reads. Mirrors the store's wire representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub app_properties: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

impl StoredObject {
    /// Property value by key, if present.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.app_properties.get(key).map(String::as_str)
    }

    /// True when every listed property key is present, regardless of value.
    pub fn has_props(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.app_properties.contains_key(*key))
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == MIME_PDF
    }

    /// Object name without its final extension.
    pub fn basename(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => &self.name,
        }
    }
}
