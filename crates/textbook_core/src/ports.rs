//! crates/textbook_core/src/ports.rs
//!
//! Defines the service contracts (traits) the project store depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the storage backend, the PDF library and the LLM provider.

use crate::domain::{ExportFormat, ExportReceipt, Notice, Project};
use crate::outline::GenerationOutput;
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The collaborator could not be reached or answered with a non-success status.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The collaborator answered, but with a payload that cannot be used.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable key-value storage. The store keeps its whole project collection
/// under a single key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> PortResult<()>;
}

#[async_trait]
pub trait TextExtractionService: Send + Sync {
    /// Extracts the text of a PDF given its raw bytes.
    async fn extract_text(&self, pdf_bytes: &[u8]) -> PortResult<String>;
}

#[async_trait]
pub trait OutlineGenerationService: Send + Sync {
    /// Turns a corpus of extracted document text into a chapter/section outline.
    async fn generate_outline(&self, corpus: &str) -> PortResult<GenerationOutput>;
}

#[async_trait]
pub trait ExportService: Send + Sync {
    async fn export(&self, project: &Project, format: ExportFormat) -> PortResult<ExportReceipt>;
}

/// The user-visible notice channel.
pub trait NotificationService: Send + Sync {
    fn notify(&self, notice: Notice);
}
