use serde::{Deserialize, Serialize};

use crate::domain::Statistics;

pub const PROCESS_IMAGE_PATH: &str = "/process-image";
pub const DOWNLOAD_DOCX_PATH: &str = "/download-docx";

/// Multipart field the extraction endpoint reads the image from.
pub const IMAGE_FIELD_NAME: &str = "file";

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    pub text: String,
    pub stats: Statistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDocxRequest {
    pub text: String,
}
