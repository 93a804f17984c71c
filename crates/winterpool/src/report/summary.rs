//! CSV summary artifact.

use super::{PoolRecord, RenderError};

/// Header row. Column names are part of the artifact's interface;
/// downstream spreadsheets key on them.
pub(crate) const SUMMARY_HEADERS: [&str; 4] =
    ["UCAS Personal ID", "Extracted Name", "PDF", "Extracted text"];

pub(crate) fn render_summary(records: &[PoolRecord]) -> Result<Vec<u8>, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADERS)?;

    for record in records {
        writer.write_record([
            record.personal_id.as_str(),
            record.name.as_str(),
            record.document_link.as_deref().unwrap_or(""),
            record.text_link.as_deref().unwrap_or(""),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| RenderError::Finish(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, doc: Option<&str>, text: Option<&str>) -> PoolRecord {
        PoolRecord {
            personal_id: id.to_string(),
            name: name.to_string(),
            document_link: doc.map(str::to_string),
            text_link: text.map(str::to_string),
        }
    }

    #[test]
    fn test_summary_starts_with_header_row() {
        let csv = String::from_utf8(render_summary(&[]).unwrap()).unwrap();
        assert_eq!(
            csv.lines().next(),
            Some("UCAS Personal ID,Extracted Name,PDF,Extracted text")
        );
    }

    #[test]
    fn test_summary_rows_follow_record_order() {
        let records = vec![
            record(
                "123456",
                "Janet Smith",
                Some("memory://view/mem-0002"),
                Some("memory://view/mem-0003"),
            ),
            record("999999", "Arjun Patel", Some("memory://view/mem-0004"), None),
        ];

        let csv = String::from_utf8(render_summary(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "123456,Janet Smith,memory://view/mem-0002,memory://view/mem-0003"
        );
        assert_eq!(lines[2], "999999,Arjun Patel,memory://view/mem-0004,");
    }

    #[test]
    fn test_summary_quotes_fields_with_commas() {
        let records = vec![record("123456", "Smith, Janet", None, None)];
        let csv = String::from_utf8(render_summary(&records).unwrap()).unwrap();

        assert!(csv.contains("\"Smith, Janet\""));
    }
}
