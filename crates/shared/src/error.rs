use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the processing service returns alongside a 4xx/5xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub error: String,
}

impl ServiceErrorBody {
    /// Best-effort decode of an error body; services are free to send anything
    /// on failure, so an unparseable body yields `None`.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

#[derive(Debug, Error)]
#[error("service rejected request with status {status}: {message}")]
pub struct ServiceException {
    pub status: u16,
    pub message: String,
}

impl ServiceException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Builds the exception from a raw response body, preferring the
    /// service's own `error` field and falling back to the trimmed text.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = match ServiceErrorBody::from_slice(body) {
            Some(parsed) => parsed.error,
            None => String::from_utf8_lossy(body).trim().to_string(),
        };
        Self::new(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_service_error_field() {
        let exception = ServiceException::from_response(400, br#"{"error":"No file uploaded"}"#);
        assert_eq!(exception.status, 400);
        assert_eq!(exception.message, "No file uploaded");
    }

    #[test]
    fn non_json_error_body_decodes_to_none() {
        assert_eq!(ServiceErrorBody::from_slice(b"<html>502</html>"), None);
        assert_eq!(
            ServiceErrorBody::from_slice(br#"{"error":"bad image"}"#),
            Some(ServiceErrorBody {
                error: "bad image".to_string()
            })
        );
    }

    #[test]
    fn falls_back_to_raw_body_text() {
        let exception = ServiceException::from_response(500, b"  Internal Server Error\n");
        assert_eq!(exception.message, "Internal Server Error");
        assert_eq!(
            exception.to_string(),
            "service rejected request with status 500: Internal Server Error"
        );
    }
}
