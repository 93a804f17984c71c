//! The document pipeline.
//!
//! Four idempotent stages over the shared folders: ingestion copies new
//! incoming PDFs under opaque names, recognition attaches a text
//! companion, extraction votes an applicant identifier out of the text,
//! and publication regenerates the index and summary artifacts. All
//! state lives in object properties in the store; running the pipeline
//! again, or in several processes at once, converges on the same state.

pub mod error;
pub mod runner;

pub use error::PipelineError;
pub use runner::{Pipeline, RunSummary};
