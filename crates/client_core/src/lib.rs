use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use shared::{domain::DEFAULT_EXPORT_FILE_NAME, protocol::ProcessImageResponse};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub mod error;
pub mod session;
pub mod transport;

pub use error::{EditError, ExportError, ExtractionError, SubmitError, EXTRACTION_FAILED_MESSAGE};
pub use session::{UploadSession, UploadStatus};
pub use transport::HttpProcessingBackend;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Remote side of the workflow: image extraction and document export.
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    async fn process_image(&self, upload: &ImageUpload)
        -> Result<ProcessImageResponse, ExtractionError>;
    async fn download_docx(&self, text: &str) -> Result<Vec<u8>, ExportError>;
}

/// An image picked by the user, as sent to the extraction endpoint.
///
/// The payload is shared, so cloning an upload or handing it to the transport
/// does not copy the image.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes: Bytes::from(bytes),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn content_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Binary document returned by the export endpoint, ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(UploadSession),
    ExportFailed { message: String },
}

struct ControllerState {
    session: UploadSession,
    /// Bumped by every accepted submission and every reset. An extraction
    /// result is applied only while its generation is still current.
    generation: u64,
}

/// Drives one upload/process/edit/export cycle against a [`ProcessingBackend`].
///
/// Concurrent submissions follow a latest-wins policy: a new `submit` (or a
/// `reset`) supersedes any extraction still in flight, whose result is then
/// dropped when it arrives.
pub struct UploadController {
    backend: Arc<dyn ProcessingBackend>,
    export_file_name: String,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<SessionEvent>,
}

impl UploadController {
    pub fn new(backend: Arc<dyn ProcessingBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            inner: Mutex::new(ControllerState {
                session: UploadSession::Idle,
                generation: 0,
            }),
            events,
        }
    }

    pub fn connect(server_url: impl Into<String>) -> Self {
        Self::new(Arc::new(HttpProcessingBackend::new(server_url)))
    }

    pub fn with_export_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.export_file_name = file_name.into();
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> UploadSession {
        self.state().session.clone()
    }

    pub fn status(&self) -> UploadStatus {
        self.state().session.status()
    }

    /// Uploads `upload` for extraction and waits for the outcome.
    ///
    /// Extraction failures never surface as `Err`: they land in the session as
    /// [`UploadSession::Error`]. The returned value is the session as it stands
    /// once this call settles, which may belong to a newer submission if this
    /// one was superseded.
    ///
    /// Dropping the returned future before it completes (a `select!` or a
    /// `tokio::time::timeout` around it) abandons the extraction and puts the
    /// session back to `idle`, unless a newer submission or a reset already
    /// took over.
    pub async fn submit(&self, upload: ImageUpload) -> Result<UploadSession, SubmitError> {
        if upload.is_empty() {
            warn!(file = %upload.file_name, "rejected empty upload");
            return Err(SubmitError::EmptyFile {
                file_name: upload.file_name,
            });
        }

        let generation = {
            let mut state = self.state();
            if state.session.is_busy() {
                info!(
                    superseded = state.generation,
                    "new upload supersedes in-flight extraction"
                );
            }
            state.generation += 1;
            self.transition(&mut state, UploadSession::Uploading);
            state.generation
        };

        info!(
            file = %upload.file_name,
            content_type = upload.content_type(),
            size_bytes = upload.bytes.len(),
            generation,
            "submitting image for extraction"
        );
        let mut in_flight = InFlightExtraction {
            controller: self,
            generation,
            armed: true,
        };
        let outcome = self.backend.process_image(&upload).await;
        in_flight.armed = false;

        let mut state = self.state();
        if state.generation != generation {
            debug!(
                generation,
                current = state.generation,
                "discarding superseded extraction result"
            );
            return Ok(state.session.clone());
        }

        let next = match outcome {
            Ok(ProcessImageResponse { text, stats }) => {
                info!(
                    generation,
                    word_count = stats.word_count,
                    char_count = stats.char_count,
                    "extraction succeeded"
                );
                UploadSession::Success { text, stats }
            }
            Err(err) => {
                error!(generation, error = %err, "extraction failed");
                UploadSession::Error {
                    error_message: EXTRACTION_FAILED_MESSAGE.to_string(),
                }
            }
        };
        self.transition(&mut state, next);
        Ok(state.session.clone())
    }

    /// Returns to `idle` from any state. Idempotent; never touches the network.
    pub fn reset(&self) {
        let mut state = self.state();
        state.generation += 1;
        self.transition(&mut state, UploadSession::Idle);
    }

    /// Replaces the extracted text. Statistics keep describing the text as
    /// originally extracted.
    pub fn edit_text(&self, new_text: impl Into<String>) -> Result<(), EditError> {
        let mut state = self.state();
        let UploadSession::Success { stats, .. } = &state.session else {
            return Err(EditError::NotEditable {
                status: state.session.status(),
            });
        };
        let next = UploadSession::Success {
            text: new_text.into(),
            stats: *stats,
        };
        self.transition(&mut state, next);
        Ok(())
    }

    /// Exports `text` as a document. Independent of the session: it neither
    /// reads nor changes it.
    pub async fn export(&self, text: &str) -> Result<ExportedDocument, ExportError> {
        info!(chars = text.chars().count(), "requesting document export");
        match self.backend.download_docx(text).await {
            Ok(bytes) => {
                info!(size_bytes = bytes.len(), file = %self.export_file_name, "export ready");
                Ok(ExportedDocument {
                    file_name: self.export_file_name.clone(),
                    bytes,
                })
            }
            Err(err) => {
                warn!(error = %err, "document export failed");
                let _ = self.events.send(SessionEvent::ExportFailed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Exports the session's current, possibly edited, text.
    pub async fn export_current(&self) -> Result<ExportedDocument, ExportError> {
        let text = {
            let state = self.state();
            match state.session.text() {
                Some(text) => text.to_string(),
                None => {
                    return Err(ExportError::NotReady {
                        status: state.session.status(),
                    })
                }
            }
        };
        self.export(&text).await
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        // Every transition is a single assignment, so a poisoned lock still
        // guards a consistent session.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: &mut ControllerState, next: UploadSession) {
        debug!(
            from = %state.session.status(),
            to = %next.status(),
            "session transition"
        );
        state.session = next;
        let _ = self
            .events
            .send(SessionEvent::StateChanged(state.session.clone()));
    }
}

/// Puts the session back to `idle` when a `submit` future is dropped while its
/// extraction is still current.
struct InFlightExtraction<'a> {
    controller: &'a UploadController,
    generation: u64,
    armed: bool,
}

impl Drop for InFlightExtraction<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.controller.state();
        if state.generation == self.generation && state.session.is_busy() {
            warn!(
                generation = self.generation,
                "extraction abandoned before completion"
            );
            state.generation += 1;
            self.controller.transition(&mut state, UploadSession::Idle);
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
