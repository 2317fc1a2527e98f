//! services/api/src/adapters/export.rs
//!
//! The default export collaborator. Rendering textbooks into PDF, DOCX or HTML
//! files is handled elsewhere; this adapter reports completion after a delay
//! and names the file the renderer would produce.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use textbook_core::{
    domain::{ExportFormat, ExportReceipt, Project},
    ports::{ExportService, PortResult},
};
use tracing::info;

#[derive(Clone, Debug)]
pub struct SimulatedExportAdapter {
    delay: Duration,
}

impl SimulatedExportAdapter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Lowercase, dash-separated file stem for a project title.
pub fn file_stem(title: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));
    let lowered = title.to_lowercase();
    let stem = re.replace_all(&lowered, "-");
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "textbook".to_string()
    } else {
        stem.to_string()
    }
}

#[async_trait]
impl ExportService for SimulatedExportAdapter {
    async fn export(&self, project: &Project, format: ExportFormat) -> PortResult<ExportReceipt> {
        tokio::time::sleep(self.delay).await;
        let file_name = format!("{}.{}", file_stem(&project.title), format.extension());
        info!(project_id = %project.id, %format, file = %file_name, "Exporting textbook");
        Ok(ExportReceipt { format, file_name })
    }
}
