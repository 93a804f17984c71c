use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Object store failed: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Recognition failed: {0}")]
    Recognize(#[from] crate::recognizer::RecognizeError),

    #[error("Report rendering failed: {0}")]
    Render(#[from] crate::report::RenderError),
}

impl PipelineError {
    /// True when the failure is an authorization problem. Retrying
    /// inside this process cannot fix those; the operator has to
    /// re-authorize.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            PipelineError::Store(crate::store::StoreError::Auth(_))
        )
    }
}
