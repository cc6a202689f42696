//! HTTP implementation of [`ProcessingBackend`] against the remote OCR service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::ACCEPT,
    multipart::{Form, Part},
    Client,
};
use shared::{
    error::ServiceException,
    protocol::{
        DownloadDocxRequest, ProcessImageResponse, DOCX_MIME_TYPE, DOWNLOAD_DOCX_PATH,
        IMAGE_FIELD_NAME, PROCESS_IMAGE_PATH,
    },
};
use tracing::debug;

use crate::{
    error::{ExportError, ExtractionError},
    ImageUpload, ProcessingBackend,
};

pub struct HttpProcessingBackend {
    http: Client,
    server_url: String,
}

impl HttpProcessingBackend {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    /// Same as [`HttpProcessingBackend::new`] but every request is abandoned
    /// after `timeout`.
    pub fn with_timeout(
        server_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, server_url))
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { http, server_url }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

#[async_trait]
impl ProcessingBackend for HttpProcessingBackend {
    async fn process_image(
        &self,
        upload: &ImageUpload,
    ) -> Result<ProcessImageResponse, ExtractionError> {
        let part = Part::stream_with_length(upload.bytes.clone(), upload.bytes.len() as u64)
            .file_name(upload.file_name.clone())
            .mime_str(upload.content_type())
            .map_err(ExtractionError::Transport)?;
        let form = Form::new().part(IMAGE_FIELD_NAME, part);

        let response = self
            .http
            .post(self.endpoint(PROCESS_IMAGE_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(ExtractionError::Transport)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(ExtractionError::Transport)?;
        debug!(
            status = status.as_u16(),
            body_len = body.len(),
            "extraction response received"
        );

        if !status.is_success() {
            return Err(ServiceException::from_response(status.as_u16(), &body).into());
        }

        let parsed: ProcessImageResponse =
            serde_json::from_slice(&body).map_err(|e| ExtractionError::Malformed {
                reason: e.to_string(),
            })?;
        if !parsed.stats.is_valid() {
            return Err(ExtractionError::Malformed {
                reason: format!(
                    "average word length out of range: {}",
                    parsed.stats.avg_word_length
                ),
            });
        }
        Ok(parsed)
    }

    async fn download_docx(&self, text: &str) -> Result<Vec<u8>, ExportError> {
        let response = self
            .http
            .post(self.endpoint(DOWNLOAD_DOCX_PATH))
            .header(ACCEPT, DOCX_MIME_TYPE)
            .json(&DownloadDocxRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(ExportError::Transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(ExportError::Transport)?;
        debug!(
            status = status.as_u16(),
            body_len = body.len(),
            "export response received"
        );

        if !status.is_success() {
            return Err(ServiceException::from_response(status.as_u16(), &body).into());
        }
        if body.is_empty() {
            return Err(ExportError::EmptyDocument);
        }
        Ok(body.to_vec())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
