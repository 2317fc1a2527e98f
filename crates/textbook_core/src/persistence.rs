//! crates/textbook_core/src/persistence.rs
//!
//! The persisted record format for the project collection and the repository
//! that reads and writes it through a `KeyValueStore`.
//!
//! The record is a versioned envelope: `{ "version": 1, "projects": [...] }`.
//! Records written before versioning existed are bare arrays and are read as
//! version 0.

use crate::domain::Project;
use crate::ports::{KeyValueStore, PortError, PortResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_STORAGE_KEY: &str = "textbookProjects";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Storage error: {0}")]
    Port(#[from] PortError),
    #[error("Stored project record is malformed: {0}")]
    Malformed(String),
    #[error("Stored project record has version {0}, newer than this build supports")]
    UnsupportedVersion(u32),
}

#[derive(Serialize)]
struct StoredProjectsRef<'a> {
    version: u32,
    projects: &'a [Project],
}

#[derive(Deserialize)]
struct StoredProjects {
    version: u32,
    projects: Vec<Project>,
}

/// Serializes the collection into the current record format.
pub fn encode(projects: &[Project]) -> Result<String, PersistError> {
    serde_json::to_string(&StoredProjectsRef { version: SCHEMA_VERSION, projects })
        .map_err(|e| PersistError::Malformed(e.to_string()))
}

/// Parses a stored record of any supported version.
pub fn decode(raw: &str) -> Result<Vec<Project>, PersistError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| PersistError::Malformed(e.to_string()))?;

    if value.is_array() {
        debug!("Reading unversioned project record");
        return serde_json::from_value(value).map_err(|e| PersistError::Malformed(e.to_string()));
    }

    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PersistError::Malformed("missing numeric `version` field".to_string()))?;
    let version = u32::try_from(version).map_err(|_| PersistError::UnsupportedVersion(u32::MAX))?;
    if version > SCHEMA_VERSION {
        return Err(PersistError::UnsupportedVersion(version));
    }

    let stored: StoredProjects =
        serde_json::from_value(value).map_err(|e| PersistError::Malformed(e.to_string()))?;
    debug!(version = stored.version, count = stored.projects.len(), "Decoded project record");
    Ok(stored.projects)
}

//=========================================================================================
// Repository
//=========================================================================================

/// Reads and writes the whole project collection under one key.
#[derive(Clone)]
pub struct ProjectRepository {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl ProjectRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    /// Loads the stored collection; a missing record is an empty collection.
    pub async fn load(&self) -> Result<Vec<Project>, PersistError> {
        match self.kv.get(&self.key).await? {
            Some(raw) => {
                let projects = decode(&raw)?;
                info!(key = %self.key, count = projects.len(), "Loaded stored projects");
                Ok(projects)
            }
            None => {
                info!(key = %self.key, "No stored projects found, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Replaces the stored collection. Last writer wins.
    pub async fn save(&self, projects: &[Project]) -> Result<(), PersistError> {
        let raw = encode(projects)?;
        self.kv.put(&self.key, &raw).await?;
        debug!(key = %self.key, count = projects.len(), bytes = raw.len(), "Persisted projects");
        Ok(())
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

/// A `KeyValueStore` that lives only as long as the process.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> PortResult<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{now_millis, Chapter, Document, Section};

    fn sample_projects() -> Vec<Project> {
        let mut first = Project::new("First");
        let mut doc = Document::new_upload("a.pdf", 2048, now_millis());
        doc.mark_ready(Some("Alpha...".to_string()));
        first.documents.push(doc);
        first.chapters.push(Chapter {
            id: "chapter-1".to_string(),
            title: "Intro".to_string(),
            sections: vec![Section {
                id: "section-1-1".to_string(),
                title: "Start".to_string(),
                content: "Body".to_string(),
            }],
        });
        vec![first, Project::new("Second")]
    }

    #[tokio::test]
    async fn save_then_load_reproduces_the_collection() {
        let repo = ProjectRepository::new(Arc::new(MemoryKeyValueStore::new()), DEFAULT_STORAGE_KEY);
        let projects = sample_projects();
        repo.save(&projects).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), projects);
    }

    #[tokio::test]
    async fn missing_record_loads_empty() {
        let repo = ProjectRepository::new(Arc::new(MemoryKeyValueStore::new()), "nothing-here");
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[test]
    fn encoded_record_carries_the_schema_version() {
        let raw = encode(&[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert_eq!(value["projects"], serde_json::json!([]));
    }

    #[test]
    fn unversioned_array_is_still_readable() {
        let legacy = r##"[{
            "id": "1712345678901",
            "title": "Old Book",
            "createdAt": 1712345678901,
            "updatedAt": 1712345678999,
            "documents": [{
                "id": "doc-1712345678950-abc123xyz",
                "name": "old.pdf",
                "size": 1000,
                "lastModified": 1712000000000,
                "status": "ready",
                "progress": 100,
                "content": "Old text..."
            }],
            "chapters": [],
            "style": {
                "fontFamily": "serif",
                "fontSize": 12,
                "primaryColor": "#1E3A8A",
                "includeImages": true,
                "includeHighlights": true,
                "chapterNumbering": true
            }
        }]"##;
        let projects = decode(legacy).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "1712345678901");
        assert_eq!(projects[0].documents[0].content.as_deref(), Some("Old text..."));
    }

    #[test]
    fn newer_versions_and_garbage_are_refused() {
        assert!(matches!(
            decode(r#"{"version": 99, "projects": []}"#),
            Err(PersistError::UnsupportedVersion(99))
        ));
        assert!(matches!(decode("not json"), Err(PersistError::Malformed(_))));
        assert!(matches!(decode(r#"{"projects": []}"#), Err(PersistError::Malformed(_))));
    }
}
