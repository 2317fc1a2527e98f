//! crates/textbook_core/src/domain.rs
//!
//! Defines the core data structures of a textbook project.
//! These are the values the `ProjectStore` owns and persists; the field names
//! serialize in camelCase with millisecond timestamps so the stored record stays
//! readable by the browser front-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Returns the current time truncated to whole milliseconds, the resolution
/// at which timestamps are persisted.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

//=========================================================================================
// Documents
//=========================================================================================

/// Processing state of an uploaded source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Ready,
    Error,
}

/// One uploaded source file and its extraction status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A bounded preview of the extracted text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl Document {
    /// Creates a document for a file that has just been accepted for processing.
    pub fn new_upload(name: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            id: format!("doc-{}", Uuid::new_v4()),
            name: name.into(),
            size,
            last_modified,
            status: DocumentStatus::Uploading,
            progress: Some(0),
            error: None,
            content: None,
            thumbnail: None,
        }
    }

    pub fn mark_processing(&mut self, progress: u8) {
        self.status = DocumentStatus::Processing;
        self.progress = Some(progress.min(100));
        self.error = None;
    }

    pub fn mark_ready(&mut self, content: Option<String>) {
        self.status = DocumentStatus::Ready;
        self.progress = Some(100);
        self.error = None;
        self.content = content;
    }

    /// Marks the document as failed. An error status always carries a message.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = DocumentStatus::Error;
        self.progress = None;
        self.error = Some(if message.trim().is_empty() {
            "Unknown error processing PDF".to_string()
        } else {
            message
        });
    }

    pub fn is_ready(&self) -> bool {
        self.status == DocumentStatus::Ready
    }

    /// Still uploading or extracting.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.status, DocumentStatus::Uploading | DocumentStatus::Processing)
    }

    /// Restores the error-carries-a-message rule on documents that came from
    /// outside the store.
    pub fn normalize(&mut self) {
        if self.status == DocumentStatus::Error {
            let message = self.error.take().unwrap_or_default();
            self.mark_failed(message);
        }
    }
}

//=========================================================================================
// Generated content
//=========================================================================================

/// A titled block of generated textbook content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// A chapter and its sections, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub sections: Vec<Section>,
}

//=========================================================================================
// Projects
//=========================================================================================

/// Presentation settings applied when a textbook is previewed or exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub font_family: String,
    pub font_size: u16,
    pub primary_color: String,
    pub include_images: bool,
    pub include_highlights: bool,
    pub chapter_numbering: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            font_size: 12,
            primary_color: "#1E3A8A".to_string(),
            include_images: true,
            include_highlights: true,
            chapter_numbering: true,
        }
    }
}

/// The aggregate root: documents, generated chapters and style of one textbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    pub documents: Vec<Document>,
    pub chapters: Vec<Chapter>,
    pub style: Style,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            documents: Vec::new(),
            chapters: Vec::new(),
            style: Style::default(),
        }
    }

    /// Refreshes `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at).max(self.created_at);
    }

    /// A project with no chapters has not been generated yet and has nothing to preview.
    pub fn is_generated(&self) -> bool {
        !self.chapters.is_empty()
    }

    pub fn has_ready_document(&self) -> bool {
        self.documents.iter().any(Document::is_ready)
    }

    /// Joins the extracted previews of every document into one generation corpus.
    pub fn corpus(&self) -> String {
        self.documents
            .iter()
            .filter_map(|d| d.content.as_deref())
            .filter(|c| !c.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

//=========================================================================================
// Export and notices
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

/// What an export collaborator reports back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReceipt {
    pub format: ExportFormat,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A user-visible message raised by a store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }
}
