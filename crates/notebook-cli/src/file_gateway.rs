//! Gateway persisting every record to a single JSON file.
//!
//! Mutations are applied to a copy of the records, written to disk and only
//! then made visible, so a failed write leaves both the file and memory as
//! they were. Writes go through a temporary file and a rename.

use anyhow::{Context, Result};
use async_trait::async_trait;
use notebook_core::gateway::{self, GatewayError, NoteGateway, RecordSet};
use notebook_core::{Folder, FolderId, NewNote, Note, NoteId, NotePatch, Timestamp, UserId};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// File name of the record store inside the data directory.
pub const RECORDS_FILE: &str = "notes.json";

pub struct JsonFileGateway {
    path: PathBuf,
    records: Mutex<RecordSet>,
}

impl JsonFileGateway {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {:?}", path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No record store at {:?}, starting empty", path);
                RecordSet::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {:?}", path));
            }
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Open `notes.json` inside `data_dir`.
    pub async fn in_dir(data_dir: &Path) -> Result<Self> {
        Self::open(data_dir.join(RECORDS_FILE)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &RecordSet) -> gateway::Result<()> {
        let unavailable = |e: std::io::Error| {
            GatewayError::Unavailable(format!("Failed to write {:?}: {}", self.path, e))
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(unavailable)?;
        }
        let contents = serde_json::to_vec_pretty(records)
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).await.map_err(unavailable)?;
        fs::rename(&tmp, &self.path).await.map_err(unavailable)?;
        Ok(())
    }

    /// Apply `f` to a copy of the records and commit it once it is on disk.
    /// Operations that change nothing skip the write.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut RecordSet) -> gateway::Result<T>,
    ) -> gateway::Result<T> {
        let mut records = self.records.lock().await;
        let mut next = records.clone();
        let value = f(&mut next)?;

        if next.revision() != records.revision() {
            self.persist(&next).await?;
            *records = next;
        }
        Ok(value)
    }
}

#[async_trait]
impl NoteGateway for JsonFileGateway {
    async fn create_note(&self, owner: &UserId, new: NewNote) -> gateway::Result<Note> {
        self.mutate(|r| r.create_note(owner, new)).await
    }

    async fn get_note(&self, owner: &UserId, id: NoteId) -> gateway::Result<Note> {
        self.records.lock().await.get_note(owner, id)
    }

    async fn update_note(
        &self,
        owner: &UserId,
        id: NoteId,
        patch: NotePatch,
        expected_updated_at: Option<Timestamp>,
    ) -> gateway::Result<Note> {
        self.mutate(|r| r.update_note(owner, id, patch, expected_updated_at))
            .await
    }

    async fn move_note(
        &self,
        owner: &UserId,
        id: NoteId,
        folder: Option<FolderId>,
    ) -> gateway::Result<Note> {
        self.mutate(|r| r.move_note(owner, id, folder)).await
    }

    async fn delete_note(&self, owner: &UserId, id: NoteId) -> gateway::Result<()> {
        self.mutate(|r| r.delete_note(owner, id)).await
    }

    async fn list_notes(&self, owner: &UserId) -> gateway::Result<Vec<Note>> {
        Ok(self.records.lock().await.list_notes(owner))
    }

    async fn list_notes_after(
        &self,
        owner: &UserId,
        after: Timestamp,
    ) -> gateway::Result<Vec<Note>> {
        Ok(self.records.lock().await.list_notes_after(owner, after))
    }

    async fn create_folder(&self, owner: &UserId, name: &str) -> gateway::Result<Folder> {
        self.mutate(|r| r.create_folder(owner, name)).await
    }

    async fn rename_folder(
        &self,
        owner: &UserId,
        id: FolderId,
        name: &str,
    ) -> gateway::Result<Folder> {
        self.mutate(|r| r.rename_folder(owner, id, name)).await
    }

    async fn delete_folder(&self, owner: &UserId, id: FolderId) -> gateway::Result<()> {
        self.mutate(|r| r.delete_folder(owner, id)).await
    }

    async fn list_folders(&self, owner: &UserId) -> gateway::Result<Vec<Folder>> {
        Ok(self.records.lock().await.list_folders(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileGateway::in_dir(temp.path()).await.unwrap();

        let folder = store.create_folder(&alice(), "Work").await.unwrap();
        let note = store
            .create_note(
                &alice(),
                NewNote {
                    title: Some("Plan".into()),
                    description: Some("Q1 goals".into()),
                    folder_id: Some(folder.id),
                },
            )
            .await
            .unwrap();
        drop(store);

        let reopened = JsonFileGateway::in_dir(temp.path()).await.unwrap();
        assert_eq!(reopened.get_note(&alice(), note.id).await.unwrap(), note);
        assert_eq!(reopened.list_folders(&alice()).await.unwrap(), vec![folder]);
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileGateway::in_dir(temp.path()).await.unwrap();

        assert!(store.list_notes(&alice()).await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_noop_update_does_not_touch_file() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileGateway::in_dir(temp.path()).await.unwrap();
        let note = store
            .create_note(&alice(), NewNote::default())
            .await
            .unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let same = store
            .update_note(&alice(), note.id, NotePatch::title(note.title.clone()), None)
            .await
            .unwrap();

        assert_eq!(same, note);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_records_unchanged() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        let store = JsonFileGateway::in_dir(&dir).await.unwrap();
        // A plain file where the data directory should be
        std::fs::write(&dir, "occupied").unwrap();

        let err = store.create_folder(&alice(), "Work").await.unwrap_err();

        assert!(matches!(err, GatewayError::Unavailable(_)));
        assert!(store.list_folders(&alice()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(RECORDS_FILE), "{ nope").unwrap();

        assert!(JsonFileGateway::in_dir(temp.path()).await.is_err());
    }
}
