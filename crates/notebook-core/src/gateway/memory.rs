//! In-memory record set and the gateway built on it.
//!
//! `RecordSet` holds the storage rules (ownership scoping, folder name
//! uniqueness, timestamp ordering, no-op detection) as plain synchronous
//! methods so that any backend can wrap it behind its own lock and
//! persistence step.

use super::{GatewayError, NoteGateway, Result};
use crate::autosave::conflict;
use crate::model::{
    DEFAULT_TITLE, Folder, FolderId, NewNote, Note, NoteId, NotePatch, Timestamp, UserId,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// All notes and folders of every owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    folders: Vec<Folder>,
    /// Last timestamp handed out, so timestamps never repeat or go backwards
    #[serde(default)]
    last_timestamp: Option<Timestamp>,
    /// Number of committed mutations
    #[serde(default)]
    revision: u64,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Wall-clock time, bumped past the previous timestamp when the clock
    /// has not advanced (or went backwards).
    fn next_timestamp(&mut self) -> Timestamp {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        self.revision += 1;
        ts
    }

    fn note_index(&self, owner: &UserId, id: NoteId) -> Result<usize> {
        self.notes
            .iter()
            .position(|n| n.id == id && &n.owner_id == owner)
            .ok_or(GatewayError::NoteNotFound(id))
    }

    fn folder_index(&self, owner: &UserId, id: FolderId) -> Result<usize> {
        self.folders
            .iter()
            .position(|f| f.id == id && &f.owner_id == owner)
            .ok_or(GatewayError::FolderNotFound(id))
    }

    fn ensure_unique_name(&self, owner: &UserId, name: &str, except: Option<FolderId>) -> Result<()> {
        let taken = self
            .folders
            .iter()
            .any(|f| &f.owner_id == owner && f.name == name && Some(f.id) != except);
        if taken {
            return Err(GatewayError::DuplicateFolderName(name.to_string()));
        }
        Ok(())
    }

    pub fn create_note(&mut self, owner: &UserId, new: NewNote) -> Result<Note> {
        if let Some(folder) = new.folder_id {
            self.folder_index(owner, folder)?;
        }

        let title = match new.title {
            Some(title) if !title.is_empty() => title,
            _ => DEFAULT_TITLE.to_string(),
        };
        let now = self.next_timestamp();
        let note = Note {
            id: NoteId::generate(),
            title,
            description: new.description.unwrap_or_default(),
            folder_id: new.folder_id,
            owner_id: owner.clone(),
            created_at: now,
            updated_at: now,
        };
        self.notes.push(note.clone());
        Ok(note)
    }

    pub fn get_note(&self, owner: &UserId, id: NoteId) -> Result<Note> {
        let idx = self.note_index(owner, id)?;
        Ok(self.notes[idx].clone())
    }

    pub fn update_note(
        &mut self,
        owner: &UserId,
        id: NoteId,
        patch: NotePatch,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<Note> {
        let idx = self.note_index(owner, id)?;
        let current = &self.notes[idx];

        conflict::check(expected_updated_at, current.updated_at)
            .map_err(|conflict| GatewayError::Conflict { id, conflict })?;

        let title = patch.title.filter(|t| *t != current.title);
        let description = patch.description.filter(|d| *d != current.description);
        if title.is_none() && description.is_none() {
            return Ok(current.clone());
        }

        let now = self.next_timestamp();
        let note = &mut self.notes[idx];
        if let Some(title) = title {
            note.title = title;
        }
        if let Some(description) = description {
            note.description = description;
        }
        note.updated_at = now;
        Ok(note.clone())
    }

    pub fn move_note(&mut self, owner: &UserId, id: NoteId, folder: Option<FolderId>) -> Result<Note> {
        let idx = self.note_index(owner, id)?;
        if let Some(folder) = folder {
            self.folder_index(owner, folder)?;
        }
        if self.notes[idx].folder_id == folder {
            return Ok(self.notes[idx].clone());
        }

        let now = self.next_timestamp();
        let note = &mut self.notes[idx];
        note.folder_id = folder;
        note.updated_at = now;
        Ok(note.clone())
    }

    pub fn delete_note(&mut self, owner: &UserId, id: NoteId) -> Result<()> {
        let idx = self.note_index(owner, id)?;
        self.notes.remove(idx);
        self.revision += 1;
        Ok(())
    }

    pub fn list_notes(&self, owner: &UserId) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .notes
            .iter()
            .filter(|n| &n.owner_id == owner)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    pub fn list_notes_after(&self, owner: &UserId, after: Timestamp) -> Vec<Note> {
        let mut notes = self.list_notes(owner);
        notes.retain(|n| n.updated_at > after);
        notes
    }

    pub fn create_folder(&mut self, owner: &UserId, name: &str) -> Result<Folder> {
        self.ensure_unique_name(owner, name, None)?;

        let now = self.next_timestamp();
        let folder = Folder {
            id: FolderId::generate(),
            name: name.to_string(),
            owner_id: owner.clone(),
            created_at: now,
            updated_at: now,
        };
        self.folders.push(folder.clone());
        Ok(folder)
    }

    pub fn rename_folder(&mut self, owner: &UserId, id: FolderId, name: &str) -> Result<Folder> {
        let idx = self.folder_index(owner, id)?;
        self.ensure_unique_name(owner, name, Some(id))?;
        if self.folders[idx].name == name {
            return Ok(self.folders[idx].clone());
        }

        let now = self.next_timestamp();
        let folder = &mut self.folders[idx];
        folder.name = name.to_string();
        folder.updated_at = now;
        Ok(folder.clone())
    }

    /// Removes the folder and unfiles its notes. The notes keep their
    /// `updated_at`, since their content did not change.
    pub fn delete_folder(&mut self, owner: &UserId, id: FolderId) -> Result<()> {
        let idx = self.folder_index(owner, id)?;
        self.folders.remove(idx);
        for note in self.notes.iter_mut().filter(|n| n.folder_id == Some(id)) {
            note.folder_id = None;
        }
        self.revision += 1;
        Ok(())
    }

    pub fn list_folders(&self, owner: &UserId) -> Vec<Folder> {
        let mut folders: Vec<Folder> = self
            .folders
            .iter()
            .filter(|f| &f.owner_id == owner)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        folders
    }
}

/// Gateway backed by a `RecordSet` in memory.
pub struct InMemoryGateway {
    records: RwLock<RecordSet>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::from_records(RecordSet::new())
    }

    pub fn from_records(records: RecordSet) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of committed mutations so far. No-op updates do not count.
    pub fn revision(&self) -> u64 {
        self.read().revision()
    }

    /// Copy of the current records.
    pub fn records(&self) -> RecordSet {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RecordSet> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RecordSet> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteGateway for InMemoryGateway {
    async fn create_note(&self, owner: &UserId, new: NewNote) -> Result<Note> {
        self.write().create_note(owner, new)
    }

    async fn get_note(&self, owner: &UserId, id: NoteId) -> Result<Note> {
        self.read().get_note(owner, id)
    }

    async fn update_note(
        &self,
        owner: &UserId,
        id: NoteId,
        patch: NotePatch,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<Note> {
        self.write().update_note(owner, id, patch, expected_updated_at)
    }

    async fn move_note(&self, owner: &UserId, id: NoteId, folder: Option<FolderId>) -> Result<Note> {
        self.write().move_note(owner, id, folder)
    }

    async fn delete_note(&self, owner: &UserId, id: NoteId) -> Result<()> {
        self.write().delete_note(owner, id)
    }

    async fn list_notes(&self, owner: &UserId) -> Result<Vec<Note>> {
        Ok(self.read().list_notes(owner))
    }

    async fn list_notes_after(&self, owner: &UserId, after: Timestamp) -> Result<Vec<Note>> {
        Ok(self.read().list_notes_after(owner, after))
    }

    async fn create_folder(&self, owner: &UserId, name: &str) -> Result<Folder> {
        self.write().create_folder(owner, name)
    }

    async fn rename_folder(&self, owner: &UserId, id: FolderId, name: &str) -> Result<Folder> {
        self.write().rename_folder(owner, id, name)
    }

    async fn delete_folder(&self, owner: &UserId, id: FolderId) -> Result<()> {
        self.write().delete_folder(owner, id)
    }

    async fn list_folders(&self, owner: &UserId) -> Result<Vec<Folder>> {
        Ok(self.read().list_folders(owner))
    }
}
