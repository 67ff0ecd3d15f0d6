//! Action boundary between callers and the persistence gateway.
//!
//! Every action resolves the current user, validates its input, calls the
//! gateway and converts whatever went wrong into an `ActionError` from a
//! closed set of kinds. Nothing past this layer sees a `GatewayError` or an
//! `AuthError`.

use crate::auth::{AuthError, Authenticator};
use crate::gateway::{GatewayError, NoteGateway};
use crate::model::{
    DEFAULT_TITLE, Folder, FolderId, NewNote, Note, NoteId, NotePatch, Timestamp, User,
};
use crate::validation::{self, ValidationError};
use futures::future::try_join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Prefix that marks conflict messages, so callers that only see the text
/// can still tell a conflict apart.
pub const CONFLICT_TAG: &str = "CONFLICT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Not found or you do not have permission")]
    NotFoundOrForbidden,

    #[error("{CONFLICT_TAG}: note was updated by another session at {current}")]
    Conflict { current: Timestamp },

    #[error("Storage error: {0}")]
    Transient(String),

    #[error("User not authenticated")]
    Unauthenticated,
}

/// Kinds of action failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    NotFoundOrForbidden,
    Conflict,
    Transient,
    Unauthenticated,
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::NotFoundOrForbidden => ErrorKind::NotFoundOrForbidden,
            ActionError::Conflict { .. } => ErrorKind::Conflict,
            ActionError::Transient(_) => ErrorKind::Transient,
            ActionError::Unauthenticated => ErrorKind::Unauthenticated,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ActionError::Conflict { .. })
    }
}

impl From<GatewayError> for ActionError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NoteNotFound(_) | GatewayError::FolderNotFound(_) => {
                ActionError::NotFoundOrForbidden
            }
            GatewayError::DuplicateFolderName(_) => {
                ActionError::Validation(ValidationError::DuplicateFolderName)
            }
            GatewayError::Conflict { conflict, .. } => ActionError::Conflict {
                current: conflict.current,
            },
            GatewayError::Unavailable(message) => ActionError::Transient(message),
        }
    }
}

impl From<AuthError> for ActionError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => ActionError::Unauthenticated,
        }
    }
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Serializable outcome of an action: `{"success": true, "data": ...}` or
/// `{"success": false, "error": "...", "kind": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> From<ActionResult<T>> for ActionResponse<T> {
    fn from(result: ActionResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        }
    }
}

/// Empty titles are stored as the default title. Applied only on the way to
/// the gateway, never to what the editor compares against.
fn coerce_title(mut patch: NotePatch) -> NotePatch {
    if patch.title.as_deref() == Some("") {
        patch.title = Some(DEFAULT_TITLE.to_string());
    }
    patch
}

/// Note and folder operations for the authenticated user.
pub struct NoteActions<G, A> {
    gateway: G,
    auth: A,
}

impl<G: NoteGateway, A: Authenticator> NoteActions<G, A> {
    pub fn new(gateway: G, auth: A) -> Self {
        Self { gateway, auth }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn authenticator(&self) -> &A {
        &self.auth
    }

    async fn user(&self) -> ActionResult<User> {
        Ok(self.auth.current_user().await?)
    }

    pub async fn create_note(&self, new: NewNote) -> ActionResult<Note> {
        let result = async {
            let user = self.user().await?;
            validation::new_note(&new)?;
            Ok::<_, ActionError>(self.gateway.create_note(&user.id, new).await?)
        }
        .await;

        if let Ok(note) = &result {
            info!("Created note {}", note.id);
        }
        result.inspect_err(|e| warn!("Failed to create note: {}", e))
    }

    pub async fn get_note(&self, id: NoteId) -> ActionResult<Note> {
        let user = self.user().await?;
        Ok(self.gateway.get_note(&user.id, id).await?)
    }

    /// Partial update without a conflict check. Fields equal to the stored
    /// record are not written; if none differ, the stored note comes back
    /// unchanged.
    pub async fn update_note(&self, id: NoteId, patch: NotePatch) -> ActionResult<Note> {
        self.update_note_with_timestamp(id, patch, None).await
    }

    /// Partial update refused with `ActionError::Conflict` if the note was
    /// written after `last_known_updated_at`.
    pub async fn update_note_with_timestamp(
        &self,
        id: NoteId,
        patch: NotePatch,
        last_known_updated_at: Option<Timestamp>,
    ) -> ActionResult<Note> {
        async {
            let user = self.user().await?;
            let patch = coerce_title(patch);
            validation::patch(&patch)?;
            Ok::<_, ActionError>(self
                .gateway
                .update_note(&user.id, id, patch, last_known_updated_at)
                .await?)
        }
        .await
        .inspect_err(|e| warn!("Failed to update note {}: {}", id, e))
    }

    /// Apply several partial updates concurrently. Fails with the first
    /// error; updates that already committed stay committed.
    pub async fn batch_update_notes(&self, updates: Vec<(NoteId, NotePatch)>) -> ActionResult<Vec<Note>> {
        let user = self.user().await?;
        let updates = updates
            .into_iter()
            .map(|(id, patch)| {
                let patch = coerce_title(patch);
                validation::patch(&patch).map(|_| (id, patch))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let owner = &user.id;
        try_join_all(
            updates
                .into_iter()
                .map(|(id, patch)| self.gateway.update_note(owner, id, patch, None)),
        )
        .await
        .map_err(ActionError::from)
        .inspect_err(|e| warn!("Batch update failed: {}", e))
    }

    pub async fn move_note(&self, id: NoteId, folder: Option<FolderId>) -> ActionResult<Note> {
        async {
            let user = self.user().await?;
            Ok::<_, ActionError>(self.gateway.move_note(&user.id, id, folder).await?)
        }
        .await
        .inspect_err(|e| warn!("Failed to move note {}: {}", id, e))
    }

    pub async fn delete_note(&self, id: NoteId) -> ActionResult<()> {
        let result = async {
            let user = self.user().await?;
            Ok::<_, ActionError>(self.gateway.delete_note(&user.id, id).await?)
        }
        .await;

        if result.is_ok() {
            info!("Deleted note {}", id);
        }
        result.inspect_err(|e| warn!("Failed to delete note {}: {}", id, e))
    }

    /// Notes of the current user, most recently updated first.
    pub async fn list_notes(&self) -> ActionResult<Vec<Note>> {
        let user = self.user().await?;
        Ok(self.gateway.list_notes(&user.id).await?)
    }

    /// Notes updated strictly after `after`, most recently updated first.
    pub async fn list_notes_after(&self, after: Timestamp) -> ActionResult<Vec<Note>> {
        let user = self.user().await?;
        Ok(self.gateway.list_notes_after(&user.id, after).await?)
    }

    pub async fn create_folder(&self, name: &str) -> ActionResult<Folder> {
        let result = async {
            let user = self.user().await?;
            validation::folder_name(name)?;
            Ok::<_, ActionError>(self.gateway.create_folder(&user.id, name).await?)
        }
        .await;

        if let Ok(folder) = &result {
            info!("Created folder {} ({})", folder.name, folder.id);
        }
        result.inspect_err(|e| warn!("Failed to create folder {:?}: {}", name, e))
    }

    pub async fn rename_folder(&self, id: FolderId, name: &str) -> ActionResult<Folder> {
        async {
            let user = self.user().await?;
            validation::folder_name(name)?;
            Ok::<_, ActionError>(self.gateway.rename_folder(&user.id, id, name).await?)
        }
        .await
        .inspect_err(|e| warn!("Failed to rename folder {}: {}", id, e))
    }

    /// Delete a folder; its notes become unfiled.
    pub async fn delete_folder(&self, id: FolderId) -> ActionResult<()> {
        let result = async {
            let user = self.user().await?;
            Ok::<_, ActionError>(self.gateway.delete_folder(&user.id, id).await?)
        }
        .await;

        if result.is_ok() {
            info!("Deleted folder {}", id);
        }
        result.inspect_err(|e| warn!("Failed to delete folder {}: {}", id, e))
    }

    /// Folders of the current user, ordered by name.
    pub async fn list_folders(&self) -> ActionResult<Vec<Folder>> {
        let user = self.user().await?;
        Ok(self.gateway.list_folders(&user.id).await?)
    }
}
