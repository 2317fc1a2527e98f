//! crates/textbook_core/src/ingest.rs
//!
//! Types for the document upload pipeline: the files a user hands over, the
//! limits applied to them and the report returned once a batch is processed.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// A file as received from the upload surface, before it becomes a `Document`.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub last_modified: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Accepts `application/pdf`; an absent or generic content type falls back
    /// to the file extension.
    pub fn is_pdf(&self) -> bool {
        match self.content_type.as_deref().map(str::trim) {
            Some(ct) if ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE) => true,
            None | Some("") | Some("application/octet-stream") => {
                self.name.to_ascii_lowercase().ends_with(".pdf")
            }
            Some(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_bytes: u64,
    pub preview_chars: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Ids of the documents created for accepted files, in batch order.
    pub accepted: Vec<String>,
    pub ready: usize,
    pub failed: usize,
    /// Names of files skipped because they are not PDFs.
    pub rejected: Vec<String>,
}

/// Bounded preview of extracted text: the first `max_chars` characters
/// followed by an ellipsis.
pub fn preview_of(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut preview: String = collapsed.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::now_millis;

    fn file(name: &str, content_type: Option<&str>) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            content_type: content_type.map(str::to_string),
            last_modified: now_millis(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn pdf_detection_prefers_content_type() {
        assert!(file("report.bin", Some("application/pdf")).is_pdf());
        assert!(!file("report.pdf", Some("text/plain")).is_pdf());
        assert!(file("Report.PDF", None).is_pdf());
        assert!(file("report.pdf", Some("application/octet-stream")).is_pdf());
        assert!(!file("notes.txt", None).is_pdf());
    }

    #[test]
    fn preview_is_bounded_and_marked() {
        let text = "word ".repeat(100);
        let preview = preview_of(&text, 20);
        assert_eq!(preview.chars().count(), 23);
        assert!(preview.ends_with("..."));
        assert_eq!(preview_of("short\n\ntext", 200), "short text...");
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let preview = preview_of("ééééé", 3);
        assert_eq!(preview, "ééé...");
    }
}
