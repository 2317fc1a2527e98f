//! services/api/src/adapters/file_store.rs
//!
//! A `KeyValueStore` that keeps each key as a JSON file in a directory.
//! Used when no database is configured.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use textbook_core::ports::{KeyValueStore, PortError, PortResult};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> PortResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PortError::Unexpected(format!("Cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(PortError::Unexpected(format!("Invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!("Cannot read {}: {}", path.display(), e))),
        }
    }

    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash never leaves a half-written record.
    async fn put(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| PortError::Unexpected(format!("Cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PortError::Unexpected(format!("Cannot replace {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = value.len(), "Wrote key to disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(temp_dir.path().join("nested")).await.unwrap();

        assert_eq!(store.get("textbookProjects").await.unwrap(), None);
        store.put("textbookProjects", r#"{"version":1,"projects":[]}"#).await.unwrap();
        store.put("textbookProjects", r#"{"version":1,"projects":[1]}"#).await.unwrap();
        assert_eq!(
            store.get("textbookProjects").await.unwrap().as_deref(),
            Some(r#"{"version":1,"projects":[1]}"#)
        );
        assert!(!temp_dir.path().join("nested/textbookProjects.json.tmp").exists());
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(temp_dir.path()).await.unwrap();
        assert!(store.put("../outside", "x").await.is_err());
        assert!(store.get("").await.is_err());
    }
}
