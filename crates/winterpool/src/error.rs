use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WinterpoolError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authorization error: {0}")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Object store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Recognition error: {0}")]
    Recognize(#[from] crate::recognizer::RecognizeError),

    #[error("Report error: {0}")]
    Render(#[from] crate::report::RenderError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read job spec '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse job spec YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Job spec validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, WinterpoolError>;
