//! Shared fixtures for winterpool integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use winterpool::recognizer::{RecognizeError, TextRecognizer};
use winterpool::report::StandardRenderer;
use winterpool::store::object::props;
use winterpool::store::{MemoryStore, StoredObject, MIME_PDF};
use winterpool::Pipeline;

pub const INCOMING: &str = "incoming-folder";
pub const PROCESSED: &str = "processed-folder";

/// Recognizer that replays the document bytes as UTF-8 text, so tests
/// control recognition output through the seeded content.
pub struct EchoRecognizer;

#[async_trait]
impl TextRecognizer for EchoRecognizer {
    async fn recognize(&self, pdf_bytes: Vec<u8>) -> Result<String, RecognizeError> {
        Ok(String::from_utf8_lossy(&pdf_bytes).into_owned())
    }
}

/// Document body that will clear the extraction confidence threshold.
pub fn applicant_text(id: &str, name: &str) -> Vec<u8> {
    format!("{name} {id} UCAS Personal ID: {id}\n")
        .repeat(4)
        .into_bytes()
}

/// One in-memory store with the folder pair the pipeline works.
pub struct PoolHarness {
    pub store: Arc<MemoryStore>,
}

impl PoolHarness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// A pipeline instance over the shared store. Tests that exercise
    /// several instances call this more than once.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.store.clone(),
            Arc::new(EchoRecognizer),
            Box::new(StandardRenderer),
            INCOMING,
            PROCESSED,
        )
    }

    /// Drops an applicant PDF into the incoming folder.
    pub fn seed_applicant(&self, filename: &str, id: &str, name: &str) -> StoredObject {
        self.store.seed_object(
            INCOMING,
            filename,
            MIME_PDF,
            HashMap::new(),
            applicant_text(id, name),
        )
    }

    /// Drops a PDF with an arbitrary body into the incoming folder.
    pub fn seed_document(&self, filename: &str, body: &str) -> StoredObject {
        self.store.seed_object(
            INCOMING,
            filename,
            MIME_PDF,
            HashMap::new(),
            body.as_bytes().to_vec(),
        )
    }

    pub fn processed(&self) -> Vec<StoredObject> {
        self.store.objects_in(PROCESSED)
    }

    /// The first processed object carrying `marker`, if any.
    pub fn marked(&self, marker: &str) -> Option<StoredObject> {
        self.processed()
            .into_iter()
            .find(|object| object.has_props(&[marker]))
    }

    pub fn index_text(&self) -> Option<String> {
        self.artifact_text(props::IS_INDEX)
    }

    pub fn summary_text(&self) -> Option<String> {
        self.artifact_text(props::IS_SUMMARY)
    }

    fn artifact_text(&self, marker: &str) -> Option<String> {
        let artifact = self.marked(marker)?;
        self.store
            .content(&artifact.id)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for PoolHarness {
    fn default() -> Self {
        Self::new()
    }
}
