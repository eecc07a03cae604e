//! Error types for the extraction core.
//!
//! This module defines all error types that can occur during document
//! submission, pipeline execution, and job queries.

/// Result type alias for extraction core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document processing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document kind is not on the supported allow-list. Surfaced at
    /// submission time; no job is created.
    #[error("Unsupported document kind: {0}")]
    UnsupportedKind(String),

    /// Document bytes are empty or cannot be interpreted at all.
    #[error("Unreadable document: {0}")]
    UnreadableDocument(String),

    /// The entitlement gate rejected the request before scheduling.
    #[error("Processing denied by the current entitlement")]
    EntitlementDenied,

    /// No job exists with the given identifier.
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// The job exists but has not finished processing yet.
    #[error("Job {0} is still processing")]
    ResultNotReady(uuid::Uuid),

    /// The job finished in the failed state.
    #[error("Job {id} failed: {message}")]
    JobFailed {
        /// Identifier of the failed job
        id: uuid::Uuid,
        /// Error message recorded on the job
        message: String,
    },

    /// An extraction strategy failed internally. The pipeline catches this
    /// and degrades the affected facet; it never aborts a job on its own.
    #[error("Extraction strategy failed: {0}")]
    Strategy(String),

    /// Page rendering failed (missing renderer, corrupt page data).
    #[error("Render error: {0}")]
    Render(String),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// OCR engine error
    #[cfg(feature = "ocr")]
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Vision model error
    #[cfg(feature = "vision")]
    #[error("Vision model error: {0}")]
    Vision(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_kind_error() {
        let err = Error::UnsupportedKind(".docx".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Unsupported document kind"));
        assert!(msg.contains(".docx"));
    }

    #[test]
    fn test_job_failed_error() {
        let id = uuid::Uuid::new_v4();
        let err = Error::JobFailed {
            id,
            message: "renderer unavailable".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("renderer unavailable"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
