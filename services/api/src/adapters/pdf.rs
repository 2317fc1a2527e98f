//! services/api/src/adapters/pdf.rs
//!
//! Text extraction for uploaded PDFs using `lopdf`.
//! It implements the `TextExtractionService` port from the `core` crate.

use async_trait::async_trait;
use textbook_core::ports::{PortError, PortResult, TextExtractionService};
use tracing::debug;

/// Only the first pages are read; the store keeps a bounded preview anyway.
const DEFAULT_MAX_PAGES: usize = 3;

#[derive(Clone, Debug)]
pub struct LopdfExtractionAdapter {
    max_pages: usize,
}

impl LopdfExtractionAdapter {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages: max_pages.max(1) }
    }
}

impl Default for LopdfExtractionAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

/// Extracts the text of the first `max_pages` pages, in page order.
pub fn extract_text_from_bytes(pdf_bytes: &[u8], max_pages: usize) -> PortResult<String> {
    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| PortError::InvalidResponse(format!("Failed to parse PDF: {}", e)))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort();
    if pages.is_empty() {
        return Err(PortError::InvalidResponse("PDF has no pages".to_string()));
    }

    let mut text = String::new();
    for page_num in pages.iter().take(max_pages) {
        let page_text = doc.extract_text(&[*page_num]).unwrap_or_default();
        text.push_str(&page_text);
        if !page_text.is_empty() && !page_text.ends_with('\n') {
            text.push('\n');
        }
    }

    debug!(pages = pages.len(), read = pages.len().min(max_pages), chars = text.len(), "Extracted PDF text");
    Ok(text)
}

#[async_trait]
impl TextExtractionService for LopdfExtractionAdapter {
    async fn extract_text(&self, pdf_bytes: &[u8]) -> PortResult<String> {
        let bytes = pdf_bytes.to_vec();
        let max_pages = self.max_pages;
        // Parsing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || extract_text_from_bytes(&bytes, max_pages))
            .await
            .map_err(|e| PortError::Unexpected(format!("Extraction task failed: {}", e)))?
    }
}
