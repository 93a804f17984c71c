use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::extract::{IdentifierScanner, ScanOutcome};
use crate::recognizer::TextRecognizer;
use crate::report::{PoolRecord, ReportRenderer};
use crate::store::object::{props, StoredObject, MIME_CSV, MIME_HTML, MIME_PDF, MIME_TEXT};
use crate::store::ObjectStore;

use super::error::PipelineError;

/// Name of the index artifact in the processed folder.
const INDEX_NAME: &str = "index.html";

/// Name of the summary artifact in the processed folder.
const SUMMARY_NAME: &str = "summary.csv";

/// Properties that mark a document as fully extracted.
const EXTRACTED_PROPS: [&str; 4] = [
    props::UCAS_PERSONAL_ID,
    props::TOTAL_MATCH_COUNT,
    props::CONSISTENT_MATCH_COUNT,
    props::EXTRACTED_NAME,
];

/// Properties a document needs to appear in reports.
const REPORTED_PROPS: [&str; 2] = [props::UCAS_PERSONAL_ID, props::EXTRACTED_NAME];

/// What one settling run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Rounds that made progress before the pipeline settled.
    pub rounds: usize,

    /// Documents copied out of the incoming folder.
    pub ingested: usize,

    /// Documents that got a text companion.
    pub recognized: usize,

    /// Documents annotated with extraction results.
    pub extracted: usize,
}

pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    recognizer: Arc<dyn TextRecognizer>,
    renderer: Box<dyn ReportRenderer>,
    scanner: IdentifierScanner,
    incoming_folder_id: String,
    processed_folder_id: String,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        recognizer: Arc<dyn TextRecognizer>,
        renderer: Box<dyn ReportRenderer>,
        incoming_folder_id: impl Into<String>,
        processed_folder_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            recognizer,
            renderer,
            scanner: IdentifierScanner::new(),
            incoming_folder_id: incoming_folder_id.into(),
            processed_folder_id: processed_folder_id.into(),
        }
    }

    /// Replaces the extraction scanner, for non-default thresholds.
    pub fn with_scanner(mut self, scanner: IdentifierScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Runs rounds of the three work stages until a round makes no
    /// progress, republishing the reports after every round that did.
    ///
    /// Each stage re-reads the store before acting and handles at most
    /// one document per round, so repeated runs and concurrent
    /// instances converge on the same final state instead of tripping
    /// over each other.
    pub async fn run_until_settled(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        loop {
            info!("Copying new incoming files");
            let ingested = self.ingest_one().instrument(info_span!("ingest")).await?;

            info!("Recognizing text of unrecognized documents");
            let recognized = self
                .recognize_one()
                .instrument(info_span!("recognize"))
                .await?;

            info!("Extracting applicant info from recognized text");
            let extracted = self.extract_one().instrument(info_span!("extract")).await?;

            debug!(ingested, recognized, extracted, "Round finished");

            if !(ingested || recognized || extracted) {
                break;
            }

            summary.rounds += 1;
            summary.ingested += usize::from(ingested);
            summary.recognized += usize::from(recognized);
            summary.extracted += usize::from(extracted);

            info!("Generating index and summary documents");
            self.publish_reports().await?;
        }

        Ok(summary)
    }

    /// Incoming PDFs, shuffled so concurrent instances spread their
    /// work instead of all starting on the same document.
    async fn fetch_incoming(&self) -> Result<Vec<StoredObject>, PipelineError> {
        let mut files = self
            .store
            .list_folder(&self.incoming_folder_id, Some(MIME_PDF))
            .await?;
        files.shuffle(&mut rand::thread_rng());
        Ok(files)
    }

    /// Everything in the processed folder, shuffled the same way.
    async fn fetch_processed(&self) -> Result<Vec<StoredObject>, PipelineError> {
        let mut files = self
            .store
            .list_folder(&self.processed_folder_id, None)
            .await?;
        files.shuffle(&mut rand::thread_rng());
        Ok(files)
    }

    /// Stage 1: copy at most one new incoming document into the
    /// processed folder.
    ///
    /// A document counts as already ingested when any processed object
    /// names it as its copy source. Returns whether a copy was made.
    pub(crate) async fn ingest_one(&self) -> Result<bool, PipelineError> {
        let incoming = self.fetch_incoming().await?;
        let processed = self.fetch_processed().await?;

        let known_sources: HashSet<&str> = processed
            .iter()
            .filter_map(|item| item.prop(props::COPIED_FROM))
            .collect();

        for item in &incoming {
            if known_sources.contains(item.id.as_str()) {
                continue;
            }

            let name = random_object_name();
            info!("Copying {} to {}", item.name, name);

            let properties = HashMap::from([(props::COPIED_FROM.to_string(), item.id.clone())]);
            self.store
                .copy_into(&item.id, &self.processed_folder_id, &name, properties)
                .await?;

            // One unit of work per call keeps every stage progressing
            return Ok(true);
        }

        Ok(false)
    }

    /// Stage 2: recognize the text of at most one ingested document and
    /// upload it as a companion object, linked in both directions.
    pub(crate) async fn recognize_one(&self) -> Result<bool, PipelineError> {
        let processed = self.fetch_processed().await?;

        for item in &processed {
            if item.prop(props::COPIED_FROM).is_none() || !item.is_pdf() {
                continue;
            }
            if item.has_props(&[props::OCR_TEXT_FILE_ID]) {
                continue;
            }

            info!("Downloading and recognizing {}", item.name);
            let pdf_bytes = self.store.download(&item.id).await?;
            let text = self.recognizer.recognize(pdf_bytes).await?;

            info!("Uploading recognized text");
            let properties =
                HashMap::from([(props::PDF_SOURCE_FILE_ID.to_string(), item.id.clone())]);
            let text_object = self
                .store
                .upload(
                    &self.processed_folder_id,
                    &format!("{}.txt", item.basename()),
                    MIME_TEXT,
                    properties,
                    text.into_bytes(),
                    true,
                )
                .await?;

            // Link back last: a crash before this line leaves an orphan
            // companion, and the next round simply recognizes again.
            let link = HashMap::from([(props::OCR_TEXT_FILE_ID.to_string(), text_object.id)]);
            self.store.patch_properties(&item.id, link).await?;

            return Ok(true);
        }

        Ok(false)
    }

    /// Stage 3: scan the text companion of at most one recognized
    /// document and record the verdict on the PDF.
    ///
    /// Documents whose text yields no trustworthy identifier stay
    /// unannotated; the stage moves on to the next candidate rather
    /// than blocking the pipeline on one bad scan.
    pub(crate) async fn extract_one(&self) -> Result<bool, PipelineError> {
        let processed = self.fetch_processed().await?;
        let by_id: HashMap<&str, &StoredObject> = processed
            .iter()
            .map(|item| (item.id.as_str(), item))
            .collect();

        for item in &processed {
            let Some(text_id) = item.prop(props::OCR_TEXT_FILE_ID) else {
                continue;
            };
            if !item.is_pdf() || item.has_props(&EXTRACTED_PROPS) {
                continue;
            }

            let Some(text_item) = by_id.get(text_id) else {
                warn!("Could not find recognized text object {}", text_id);
                continue;
            };

            info!("Scanning text of {}", text_item.name);
            let text_bytes = self.store.download(&text_item.id).await?;
            let text = String::from_utf8_lossy(&text_bytes);

            match self.scanner.scan(&text) {
                ScanOutcome::Accepted(vote) => {
                    let properties = HashMap::from([
                        (props::UCAS_PERSONAL_ID.to_string(), vote.personal_id),
                        (
                            props::CONSISTENT_MATCH_COUNT.to_string(),
                            vote.consistent_matches.to_string(),
                        ),
                        (
                            props::TOTAL_MATCH_COUNT.to_string(),
                            vote.total_matches.to_string(),
                        ),
                        (props::EXTRACTED_NAME.to_string(), vote.name),
                    ]);
                    self.store.patch_properties(&item.id, properties).await?;
                    return Ok(true);
                }
                ScanOutcome::BelowThreshold { candidate, count } => {
                    warn!(
                        "Too few consistent id matches ({}) for {} in {}",
                        count, candidate, item.name
                    );
                }
                ScanOutcome::NoMatches => {
                    warn!("No UCAS id matches in text of {}", item.name);
                }
            }
        }

        Ok(false)
    }

    /// Stage 4: regenerate both report artifacts from the current state
    /// of the processed folder.
    pub(crate) async fn publish_reports(&self) -> Result<(), PipelineError> {
        let processed = self.fetch_processed().await?;

        self.publish_index(&processed)
            .instrument(info_span!("publish_index"))
            .await?;
        self.publish_summary(&processed)
            .instrument(info_span!("publish_summary"))
            .await?;

        Ok(())
    }

    async fn publish_index(&self, processed: &[StoredObject]) -> Result<(), PipelineError> {
        let records = select_records(processed);
        if records.is_empty() {
            debug!("No fully processed documents, skipping index");
            return Ok(());
        }

        let content = self.renderer.render_index(&records)?;
        self.write_artifact(processed, props::IS_INDEX, INDEX_NAME, MIME_HTML, content, true)
            .await
    }

    async fn publish_summary(&self, processed: &[StoredObject]) -> Result<(), PipelineError> {
        let records = select_records(processed);
        if records.is_empty() {
            debug!("No fully processed documents, skipping summary");
            return Ok(());
        }

        let content = self.renderer.render_summary(&records)?;
        // The summary exists to be pulled into spreadsheets, so it is
        // the one artifact left downloadable by readers.
        self.write_artifact(
            processed,
            props::IS_SUMMARY,
            SUMMARY_NAME,
            MIME_CSV,
            content,
            false,
        )
        .await
    }

    /// Creates the artifact on first publication; afterwards rewrites
    /// every object carrying the marker in place.
    async fn write_artifact(
        &self,
        processed: &[StoredObject],
        marker: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<(), PipelineError> {
        let existing: Vec<&StoredObject> = processed
            .iter()
            .filter(|item| item.has_props(&[marker]))
            .collect();

        let properties = HashMap::from([(marker.to_string(), props::MARKER.to_string())]);

        if existing.is_empty() {
            self.store
                .upload(
                    &self.processed_folder_id,
                    name,
                    mime_type,
                    properties,
                    content,
                    restrict_downloads,
                )
                .await?;
        } else {
            for item in existing {
                self.store
                    .update_content(
                        &item.id,
                        name,
                        mime_type,
                        properties.clone(),
                        content.clone(),
                        restrict_downloads,
                    )
                    .await?;
            }
        }

        Ok(())
    }
}

/// Report rows: every document carrying both extraction results, sorted
/// by surname. The sort is stable, so equal surnames keep their listing
/// order.
fn select_records(processed: &[StoredObject]) -> Vec<PoolRecord> {
    let by_id: HashMap<&str, &StoredObject> = processed
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    let mut records: Vec<PoolRecord> = processed
        .iter()
        .filter(|item| item.has_props(&REPORTED_PROPS))
        .map(|item| {
            let text_link = item
                .prop(props::OCR_TEXT_FILE_ID)
                .and_then(|text_id| by_id.get(text_id))
                .and_then(|text_item| text_item.web_view_link.clone());

            PoolRecord {
                personal_id: item
                    .prop(props::UCAS_PERSONAL_ID)
                    .unwrap_or_default()
                    .to_string(),
                name: item
                    .prop(props::EXTRACTED_NAME)
                    .unwrap_or_default()
                    .to_string(),
                document_link: item.web_view_link.clone(),
                text_link,
            }
        })
        .collect();

    records.sort_by(|a, b| a.surname().cmp(b.surname()));
    records
}

/// Opaque name for an ingested copy. Incoming names may embed applicant
/// details, so they never survive ingestion.
fn random_object_name() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}.pdf", URL_SAFE_NO_PAD.encode(bytes))
}
