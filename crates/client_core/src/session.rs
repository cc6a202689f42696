use std::fmt;

use serde::Serialize;
use shared::domain::Statistics;

/// Lifecycle phase of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Error,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload/process/edit cycle.
///
/// Each variant carries exactly the payload its status allows: text and
/// statistics only exist after a successful extraction, and an error message
/// only exists after a failed one.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadSession {
    #[default]
    Idle,
    Uploading,
    Success {
        text: String,
        stats: Statistics,
    },
    Error {
        error_message: String,
    },
}

impl UploadSession {
    pub fn status(&self) -> UploadStatus {
        match self {
            Self::Idle => UploadStatus::Idle,
            Self::Uploading => UploadStatus::Uploading,
            Self::Success { .. } => UploadStatus::Success,
            Self::Error { .. } => UploadStatus::Error,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn stats(&self) -> Option<&Statistics> {
        match self {
            Self::Success { stats, .. } => Some(stats),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error_message } => Some(error_message.as_str()),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Uploading)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
