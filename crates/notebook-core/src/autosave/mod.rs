//! Debounced autosave for the note open in the editor.
//!
//! Edits land in an in-memory buffer. [`SaveScheduler`] waits for typing to
//! pause, diffs the buffer against the last confirmed snapshot and sends only
//! the changed fields, guarded by the `updated_at` it last saw. The outcome
//! drives a [`SaveStatus`] that callers can watch.

pub mod change;
pub mod conflict;
mod scheduler;
mod status;

pub use scheduler::SaveScheduler;
pub use status::SaveStatus;

use crate::actions::{ActionResult, NoteActions};
use crate::auth::Authenticator;
use crate::gateway::NoteGateway;
use crate::model::{Note, NoteId, NotePatch, Timestamp};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);
pub const DEFAULT_SAVED_DISPLAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
    /// Quiet period after the last edit before a write is sent.
    pub debounce: Duration,
    /// How long `Saved` is shown before falling back to `Idle`.
    pub saved_display: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            saved_display: DEFAULT_SAVED_DISPLAY,
        }
    }
}

/// One autosave write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub note_id: NoteId,
    /// Only the fields that differ from the snapshot.
    pub patch: NotePatch,
    /// `updated_at` of the snapshot; `None` skips the conflict check.
    pub last_known_updated_at: Option<Timestamp>,
}

/// Where autosave writes go. Errors arrive already normalized.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    async fn save(&self, request: SaveRequest) -> ActionResult<Note>;
}

#[async_trait]
impl<G: NoteGateway, A: Authenticator> SaveTarget for NoteActions<G, A> {
    async fn save(&self, request: SaveRequest) -> ActionResult<Note> {
        self.update_note_with_timestamp(
            request.note_id,
            request.patch,
            request.last_known_updated_at,
        )
        .await
    }
}
