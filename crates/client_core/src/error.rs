use shared::error::ServiceException;
use thiserror::Error;

use crate::session::UploadStatus;

/// Message shown to the user whenever an extraction fails, whatever the cause.
pub const EXTRACTION_FAILED_MESSAGE: &str = "Failed to process image. Is the backend running?";

/// Failure of the remote extraction call. Never surfaced to the user directly;
/// the controller converts it into an `error` session.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error(transparent)]
    Status(#[from] ServiceException),
    #[error("malformed extraction response: {reason}")]
    Malformed { reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error(transparent)]
    Status(#[from] ServiceException),
    #[error("export service returned an empty document")]
    EmptyDocument,
    #[error("nothing to export while session is {status}")]
    NotReady { status: UploadStatus },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("refusing to upload empty file '{file_name}'")]
    EmptyFile { file_name: String },
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("text can only be edited after a successful extraction (session is {status})")]
    NotEditable { status: UploadStatus },
}
