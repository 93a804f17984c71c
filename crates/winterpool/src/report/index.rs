//! HTML index artifact.

use super::PoolRecord;

pub(crate) fn render_index(records: &[PoolRecord]) -> Vec<u8> {
    let mut html = String::with_capacity(1024 + records.len() * 256);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Winter pool applicants</title>\n");
    html.push_str("<style>\n");
    html.push_str("body { font-family: sans-serif; margin: 2em; }\n");
    html.push_str("table { border-collapse: collapse; }\n");
    html.push_str("th, td { border: 1px solid #999; padding: 0.4em 0.8em; text-align: left; }\n");
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str("<h1>Winter pool applicants</h1>\n");

    html.push_str(&format!(
        "<p>{} applicant document(s).</p>\n",
        records.len()
    ));

    html.push_str("<table>\n<tr><th>#</th><th>Extracted Name</th><th>UCAS Personal ID</th><th>Document</th></tr>\n");

    for (position, record) in records.iter().enumerate() {
        html.push_str("<tr><td>");
        html.push_str(&(position + 1).to_string());
        html.push_str("</td><td>");
        html.push_str(&escape_html(&record.name));
        html.push_str("</td><td>");
        html.push_str(&escape_html(&record.personal_id));
        html.push_str("</td><td>");
        match &record.document_link {
            Some(link) => {
                html.push_str("<a href=\"");
                html.push_str(&escape_html(link));
                html.push_str("\">view</a>");
            }
            None => html.push_str("n/a"),
        }
        html.push_str("</td></tr>\n");
    }

    html.push_str("</table>\n</body>\n</html>\n");
    html.into_bytes()
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, link: Option<&str>) -> PoolRecord {
        PoolRecord {
            personal_id: "123456".to_string(),
            name: name.to_string(),
            document_link: link.map(str::to_string),
            text_link: None,
        }
    }

    #[test]
    fn test_index_lists_each_record() {
        let records = vec![
            record("Janet Smith", Some("https://example.invalid/view/1")),
            record("Arjun Patel", Some("https://example.invalid/view/2")),
        ];

        let html = String::from_utf8(render_index(&records)).unwrap();

        assert!(html.contains("2 applicant document(s)."));
        assert!(html.contains("Janet Smith"));
        assert!(html.contains("Arjun Patel"));
        assert!(html.contains("href=\"https://example.invalid/view/1\""));
    }

    #[test]
    fn test_index_numbers_records_in_listing_order() {
        let records = vec![record("Janet Smith", None), record("Arjun Patel", None)];

        let html = String::from_utf8(render_index(&records)).unwrap();

        assert!(html.contains("<tr><td>1</td><td>Janet Smith</td>"));
        assert!(html.contains("<tr><td>2</td><td>Arjun Patel</td>"));
    }

    #[test]
    fn test_index_escapes_extracted_values() {
        let records = vec![record("A <b>squatter</b> & co", None)];

        let html = String::from_utf8(render_index(&records)).unwrap();

        assert!(html.contains("A &lt;b&gt;squatter&lt;/b&gt; &amp; co"));
        assert!(!html.contains("<b>squatter</b>"));
    }

    #[test]
    fn test_index_without_link_renders_placeholder() {
        let html = String::from_utf8(render_index(&[record("Janet Smith", None)])).unwrap();
        assert!(html.contains("<td>n/a</td>"));
    }

    #[test]
    fn test_escape_html_covers_quote_characters() {
        assert_eq!(escape_html(r#"a"b'c"#), "a&quot;b&#39;c");
    }
}
