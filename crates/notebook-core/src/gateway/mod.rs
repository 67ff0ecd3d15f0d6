//! Persistence gateway: durable storage of notes and folders, scoped by owner.
//!
//! Implementations:
//! - `InMemoryGateway` - For testing and embedding
//! - `JsonFileGateway` (in notebook-cli) - A JSON file on disk
//!
//! Every operation takes the owner explicitly. A record that exists but
//! belongs to somebody else is reported exactly like a missing one.

mod memory;

pub use memory::{InMemoryGateway, RecordSet};

use crate::autosave::conflict::Conflict;
use crate::model::{Folder, FolderId, NewNote, Note, NoteId, NotePatch, Timestamp, UserId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("Folder not found: {0}")]
    FolderNotFound(FolderId),

    #[error("Folder name already in use: {0}")]
    DuplicateFolderName(String),

    #[error("Note {id} changed since last read: {conflict}")]
    Conflict { id: NoteId, conflict: Conflict },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Storage backend for notes and folders.
#[async_trait]
pub trait NoteGateway: Send + Sync {
    /// Create a note. An empty or missing title is stored as the default
    /// title. The target folder, if any, must belong to `owner`.
    async fn create_note(&self, owner: &UserId, new: NewNote) -> Result<Note>;

    /// Fetch one note.
    async fn get_note(&self, owner: &UserId, id: NoteId) -> Result<Note>;

    /// Apply a partial update.
    ///
    /// If `expected_updated_at` is provided, the update fails with
    /// `GatewayError::Conflict` when the stored `updated_at` is newer
    /// (optimistic locking). When no field differs from the stored record,
    /// nothing is written and the stored note is returned as-is.
    async fn update_note(
        &self,
        owner: &UserId,
        id: NoteId,
        patch: NotePatch,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<Note>;

    /// File a note into a folder, or unfile it with `None`.
    async fn move_note(&self, owner: &UserId, id: NoteId, folder: Option<FolderId>) -> Result<Note>;

    /// Delete a note.
    async fn delete_note(&self, owner: &UserId, id: NoteId) -> Result<()>;

    /// All notes of `owner`, most recently updated first.
    async fn list_notes(&self, owner: &UserId) -> Result<Vec<Note>>;

    /// Notes of `owner` updated strictly after `after`, most recent first.
    async fn list_notes_after(&self, owner: &UserId, after: Timestamp) -> Result<Vec<Note>>;

    /// Create a folder. Names are unique per owner (exact match).
    async fn create_folder(&self, owner: &UserId, name: &str) -> Result<Folder>;

    /// Rename a folder. Renaming to its current name succeeds without a write.
    async fn rename_folder(&self, owner: &UserId, id: FolderId, name: &str) -> Result<Folder>;

    /// Delete a folder. Its notes are kept and become unfiled.
    async fn delete_folder(&self, owner: &UserId, id: FolderId) -> Result<()>;

    /// All folders of `owner`, ordered by name.
    async fn list_folders(&self, owner: &UserId) -> Result<Vec<Folder>>;
}

// Lets one gateway be shared between the action layer and tests.
#[async_trait]
impl<T: NoteGateway + ?Sized> NoteGateway for std::sync::Arc<T> {
    async fn create_note(&self, owner: &UserId, new: NewNote) -> Result<Note> {
        (**self).create_note(owner, new).await
    }

    async fn get_note(&self, owner: &UserId, id: NoteId) -> Result<Note> {
        (**self).get_note(owner, id).await
    }

    async fn update_note(
        &self,
        owner: &UserId,
        id: NoteId,
        patch: NotePatch,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<Note> {
        (**self)
            .update_note(owner, id, patch, expected_updated_at)
            .await
    }

    async fn move_note(&self, owner: &UserId, id: NoteId, folder: Option<FolderId>) -> Result<Note> {
        (**self).move_note(owner, id, folder).await
    }

    async fn delete_note(&self, owner: &UserId, id: NoteId) -> Result<()> {
        (**self).delete_note(owner, id).await
    }

    async fn list_notes(&self, owner: &UserId) -> Result<Vec<Note>> {
        (**self).list_notes(owner).await
    }

    async fn list_notes_after(&self, owner: &UserId, after: Timestamp) -> Result<Vec<Note>> {
        (**self).list_notes_after(owner, after).await
    }

    async fn create_folder(&self, owner: &UserId, name: &str) -> Result<Folder> {
        (**self).create_folder(owner, name).await
    }

    async fn rename_folder(&self, owner: &UserId, id: FolderId, name: &str) -> Result<Folder> {
        (**self).rename_folder(owner, id, name).await
    }

    async fn delete_folder(&self, owner: &UserId, id: FolderId) -> Result<()> {
        (**self).delete_folder(owner, id).await
    }

    async fn list_folders(&self, owner: &UserId) -> Result<Vec<Folder>> {
        (**self).list_folders(owner).await
    }
}
