pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod recognizer;
pub mod report;
pub mod store;

pub use auth::{AuthError, ClientSecrets, TokenManager, TokenStore};
pub use config::{load_jobspec, JobSpec, OcrSettings};
pub use error::{ConfigError, Result, WinterpoolError};
pub use extract::{IdentifierScanner, IdentifierVote, ScanOutcome};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use recognizer::{RecognizeError, TesseractRecognizer, TextRecognizer};
pub use report::{PoolRecord, ReportRenderer, StandardRenderer};
pub use store::{DriveStore, MemoryStore, ObjectStore, StoreError, StoredObject};
