//! Save status projection.
//!
//! The status is derived from scheduler and write outcomes only; there is no
//! public setter. `Saved` falls back to `Idle` on its own after a short
//! display delay.

use crate::events::{EditorEvent, EventBus};
use crate::model::NoteId;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// User-visible save status of the open note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Nothing pending or in flight
    #[default]
    Idle,
    /// A debounce timer is pending or a write is in flight
    Saving,
    /// The last write committed
    Saved,
    /// The last write was refused or failed; the edit buffer is kept
    Error,
}

impl SaveStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, SaveStatus::Saving)
    }
}

pub(crate) struct StatusProjector {
    tx: Arc<watch::Sender<SaveStatus>>,
    events: Arc<EventBus>,
    saved_display: Duration,
    /// Pending `Saved -> Idle` fallback
    fallback: Mutex<Option<JoinHandle<()>>>,
}

impl StatusProjector {
    pub(crate) fn new(events: Arc<EventBus>, saved_display: Duration) -> Self {
        let (tx, _rx) = watch::channel(SaveStatus::Idle);
        Self {
            tx: Arc::new(tx),
            events,
            saved_display,
            fallback: Mutex::new(None),
        }
    }

    pub(crate) fn current(&self) -> SaveStatus {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.tx.subscribe()
    }

    /// An edit was scheduled or a write started.
    pub(crate) fn pending(&self, note_id: Option<NoteId>) {
        self.set(note_id, SaveStatus::Saving);
    }

    /// A write committed. While more work is queued the status stays
    /// `Saving`.
    pub(crate) fn succeeded(&self, note_id: Option<NoteId>, still_busy: bool) {
        if still_busy {
            self.set(note_id, SaveStatus::Saving);
            return;
        }
        self.set(note_id, SaveStatus::Saved);
        self.schedule_fallback(note_id);
    }

    pub(crate) fn failed(&self, note_id: Option<NoteId>, still_busy: bool) {
        let status = if still_busy {
            SaveStatus::Saving
        } else {
            SaveStatus::Error
        };
        self.set(note_id, status);
    }

    /// A flush found nothing to write, or pending work was cancelled.
    pub(crate) fn settled(&self, note_id: Option<NoteId>, still_busy: bool) {
        let status = if still_busy {
            SaveStatus::Saving
        } else {
            SaveStatus::Idle
        };
        self.set(note_id, status);
    }

    fn set(&self, note_id: Option<NoteId>, status: SaveStatus) {
        if let Some(timer) = self.lock_fallback().take() {
            timer.abort();
        }
        publish(&self.tx, &self.events, note_id, status);
    }

    fn schedule_fallback(&self, note_id: Option<NoteId>) {
        let tx = Arc::clone(&self.tx);
        let events = Arc::clone(&self.events);
        let delay = self.saved_display;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if *tx.borrow() == SaveStatus::Saved {
                publish(&tx, &events, note_id, SaveStatus::Idle);
            }
        });
        *self.lock_fallback() = Some(timer);
    }

    fn lock_fallback(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.fallback.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for StatusProjector {
    fn drop(&mut self) {
        if let Some(timer) = self.lock_fallback().take() {
            timer.abort();
        }
    }
}

fn publish(
    tx: &watch::Sender<SaveStatus>,
    events: &EventBus,
    note_id: Option<NoteId>,
    status: SaveStatus,
) {
    let changed = tx.send_if_modified(|current| {
        if *current == status {
            return false;
        }
        *current = status;
        true
    });
    if changed {
        trace!("Save status -> {:?}", status);
        events.emit(EditorEvent::StatusChanged { note_id, status });
    }
}
