//! Tesseract-backed recognition engine.
//!
//! Prefers the text already embedded in the PDF; only when that text is
//! missing or unusable does it render pages with pdftoppm and run them
//! through Tesseract. Rendering and page counting shell out to
//! poppler-utils, which must be installed alongside the Tesseract data
//! for the configured languages.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{RecognizeError, TextRecognizer};

/// Marker lopdf emits for CID fonts it cannot decode.
const CID_FONT_MARKER: &str = "?Identity-H Unimplemented?";

/// Embedded text shorter than this is accepted as-is; the ratio check
/// below needs enough material to be meaningful.
const RATIO_GATE_MIN_CHARS: usize = 50;

/// Embedded text with a lower percentage of alphanumeric characters
/// than this counts as garbage and goes to OCR.
const MIN_ALNUM_PERCENT: usize = 10;

/// [`TextRecognizer`] running lopdf, pdftoppm and Tesseract on a
/// blocking worker thread.
pub struct TesseractRecognizer {
    languages: String,
    dpi: u32,
}

impl TesseractRecognizer {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self { languages, dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, pdf_bytes: Vec<u8>) -> Result<String, RecognizeError> {
        let languages = self.languages.clone();
        let dpi = self.dpi;

        tokio::task::spawn_blocking(move || recognize_pdf(&pdf_bytes, &languages, dpi))
            .await
            .map_err(|e| RecognizeError::Task(e.to_string()))?
    }
}

fn recognize_pdf(pdf_bytes: &[u8], languages: &str, dpi: u32) -> Result<String, RecognizeError> {
    match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => {
            let text = embedded_text(&doc);
            if !needs_ocr(&text) {
                return Ok(text);
            }

            debug!("Embedded text unusable, rendering pages for OCR");
            ocr_pages(pdf_bytes, doc.get_pages().len(), languages, dpi)
        }
        Err(e) => {
            // lopdf rejects some real-world PDFs (broken xref tables);
            // poppler handles more variants, so render blind.
            warn!("Failed to parse PDF structure: {}. Rendering pages instead.", e);
            let page_count = count_pdf_pages(pdf_bytes)?;
            ocr_pages(pdf_bytes, page_count, languages, dpi)
        }
    }
}

/// Text embedded in the PDF itself. Pages that fail to extract are
/// skipped; the quality gate decides whether the remainder is enough.
fn embedded_text(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    text
}

/// Whether the embedded text is unusable and pages must be rendered.
///
/// True when the text is empty, consists only of CID font error
/// markers, or is long enough to judge and mostly non-alphanumeric.
fn needs_ocr(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }

    let without_markers = trimmed
        .replace(CID_FONT_MARKER, "")
        .replace(['\n', ' '], "");
    if without_markers.is_empty() {
        return true;
    }

    let total = trimmed.chars().count();
    let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total > RATIO_GATE_MIN_CHARS && alnum * 100 < total * MIN_ALNUM_PERCENT
}

fn ocr_pages(
    pdf_bytes: &[u8],
    page_count: usize,
    languages: &str,
    dpi: u32,
) -> Result<String, RecognizeError> {
    let mut all_text = String::new();

    for page_num in 1..=page_count {
        let image_data = render_pdf_page(pdf_bytes, page_num as u32, dpi)?;
        let page_text = ocr_image_bytes(&image_data, languages)?;
        all_text.push_str(&page_text);
        all_text.push('\n');
    }

    Ok(all_text)
}

/// Runs Tesseract over one rendered page.
fn ocr_image_bytes(image_data: &[u8], languages: &str) -> Result<String, RecognizeError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| RecognizeError::Ocr(format!("Could not decode page image: {}", e)))?;

    // Normalize to PNG in memory for leptess
    let mut png_data = Vec::new();
    let mut cursor = Cursor::new(&mut png_data);
    img.write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| RecognizeError::Ocr(format!("Could not re-encode page image: {}", e)))?;

    let mut lt = leptess::LepTess::new(None, languages)
        .map_err(|e| RecognizeError::Ocr(format!("Tesseract initialization failed: {}", e)))?;

    lt.set_image_from_mem(&png_data)
        .map_err(|e| RecognizeError::Ocr(format!("Could not hand page to Tesseract: {}", e)))?;

    lt.get_utf8_text()
        .map_err(|e| RecognizeError::Ocr(format!("Text recognition failed: {}", e)))
}

/// Spills bytes to a uniquely named file under the system temp
/// directory. Callers remove the file once the external tool is done.
fn spill_to_temp(bytes: &[u8], tag: &str) -> Result<PathBuf, RecognizeError> {
    let path = std::env::temp_dir().join(format!("winterpool_{}_{}.pdf", tag, uuid::Uuid::new_v4()));

    std::fs::write(&path, bytes)
        .map_err(|e| RecognizeError::Pdf(format!("Could not write temporary PDF: {}", e)))?;

    Ok(path)
}

/// Page count via pdfinfo, for PDFs lopdf cannot parse.
fn count_pdf_pages(pdf_bytes: &[u8]) -> Result<usize, RecognizeError> {
    let pdf_path = spill_to_temp(pdf_bytes, "pagecount")?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output();
    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        RecognizeError::Pdf(format!(
            "Could not run pdfinfo: {}. Is poppler-utils installed?",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(RecognizeError::Pdf(format!(
            "pdfinfo exited with an error: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let report = String::from_utf8_lossy(&output.stdout);
    let pages = report
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse::<usize>().ok());

    // pdfinfo ran but did not report a count
    Ok(pages.unwrap_or(1))
}

/// Renders one page to a PNG with pdftoppm.
fn render_pdf_page(pdf_bytes: &[u8], page_num: u32, dpi: u32) -> Result<Vec<u8>, RecognizeError> {
    let pdf_path = spill_to_temp(pdf_bytes, "render")?;
    let output_prefix =
        std::env::temp_dir().join(format!("winterpool_page_{}", uuid::Uuid::new_v4()));

    let page_arg = page_num.to_string();
    let output = Command::new("pdftoppm")
        .args(["-png", "-r", &dpi.to_string(), "-f", &page_arg, "-l", &page_arg])
        .arg(&pdf_path)
        .arg(&output_prefix)
        .output();
    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        RecognizeError::Pdf(format!(
            "Could not run pdftoppm: {}. Is poppler-utils installed?",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(RecognizeError::Pdf(format!(
            "pdftoppm exited with an error: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm zero-pads the page suffix depending on total page count
    let rendered = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ]
    .into_iter()
    .find(|p| Path::new(p).exists())
    .ok_or_else(|| RecognizeError::Pdf("No rendered page image found".to_string()))?;

    let image_data = std::fs::read(&rendered)
        .map_err(|e| RecognizeError::Pdf(format!("Could not read rendered page: {}", e)))?;

    let _ = std::fs::remove_file(&rendered);

    Ok(image_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal one-page PDF with the given embedded text.
    fn pdf_with_text(text: &str) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let page_tree = doc.new_object_id();
        let font = doc.new_object_id();
        let resources = doc.new_object_id();
        let contents = doc.new_object_id();
        let page = doc.new_object_id();

        doc.objects.insert(
            font,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
            }),
        );

        doc.objects.insert(
            resources,
            Object::Dictionary(dictionary! {
                "Font" => dictionary! {
                    "F1" => font,
                },
            }),
        );

        let ops = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
        doc.objects
            .insert(contents, Object::Stream(Stream::new(dictionary! {}, ops.into_bytes())));

        doc.objects.insert(
            page,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => page_tree,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources,
                "Contents" => contents,
            }),
        );

        doc.objects.insert(
            page_tree,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
            }),
        );

        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => page_tree,
        });
        doc.trailer.set("Root", catalog);

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes).unwrap();
        pdf_bytes
    }

    #[test]
    fn test_languages_joined_with_plus() {
        let recognizer = TesseractRecognizer::new(&["eng".to_string(), "deu".to_string()], 300);
        assert_eq!(recognizer.languages, "eng+deu");
    }

    #[test]
    fn test_empty_languages_default_to_english() {
        let recognizer = TesseractRecognizer::new(&[], 300);
        assert_eq!(recognizer.languages, "eng");
        assert_eq!(recognizer.dpi(), 300);
    }

    #[tokio::test]
    async fn test_recognize_uses_embedded_text() {
        let pdf = pdf_with_text("UCAS Personal ID: 123456");
        let recognizer = TesseractRecognizer::new(&["eng".to_string()], 300);

        let text = recognizer.recognize(pdf).await.unwrap();
        assert!(text.contains("UCAS Personal ID: 123456"));
    }

    #[test]
    fn test_needs_ocr_for_empty_text() {
        assert!(needs_ocr(""));
        assert!(needs_ocr("   \n\t  "));
    }

    #[test]
    fn test_needs_ocr_for_cid_markers_only() {
        let text = "?Identity-H Unimplemented?\n?Identity-H Unimplemented?";
        assert!(needs_ocr(text));
    }

    #[test]
    fn test_needs_ocr_accepts_normal_text() {
        assert!(!needs_ocr("Application form for Jane Smith 123456"));
        // Short text passes regardless of composition
        assert!(!needs_ocr("!@#$%"));
    }

    #[test]
    fn test_needs_ocr_accepts_cid_markers_mixed_with_content() {
        let text = "Form 123 ?Identity-H Unimplemented? UCAS Personal ID: 999999";
        assert!(!needs_ocr(text));
    }

    #[test]
    fn test_needs_ocr_for_garbled_ratio() {
        // Over the length gate with under 10% alphanumeric
        let mut garbled = String::from("abcd");
        garbled.push_str(&"!".repeat(47));
        assert!(needs_ocr(&garbled));

        // At the length gate the ratio check does not apply
        let at_boundary = "!".repeat(RATIO_GATE_MIN_CHARS);
        assert!(!needs_ocr(&at_boundary));
    }

    #[test]
    fn test_ocr_rejects_invalid_image_data() {
        let result = ocr_image_bytes(b"not an image", "eng");

        match result {
            Err(RecognizeError::Ocr(msg)) => assert!(msg.contains("Could not decode")),
            other => panic!("Expected Ocr error, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_text_joins_pages() {
        let pdf = pdf_with_text("Hello from page one");
        let doc = lopdf::Document::load_mem(&pdf).unwrap();

        let text = embedded_text(&doc);
        assert!(text.contains("Hello from page one"));
        assert!(text.ends_with('\n'));
    }
}
