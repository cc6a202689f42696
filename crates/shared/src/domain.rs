use serde::{Deserialize, Serialize};

/// File name offered to the user for an exported document.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "converted_text.docx";

/// Text statistics computed by the processing service for one extraction.
///
/// The client treats this as a snapshot: it is never recomputed locally, even
/// after the extracted text is edited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub word_count: u64,
    pub sentence_count: u64,
    pub char_count: u64,
    pub avg_word_length: f64,
}

impl Statistics {
    pub fn new(
        word_count: u64,
        sentence_count: u64,
        char_count: u64,
        avg_word_length: f64,
    ) -> Self {
        Self {
            word_count,
            sentence_count,
            char_count,
            avg_word_length,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.avg_word_length.is_finite() && self.avg_word_length >= 0.0
    }
}
