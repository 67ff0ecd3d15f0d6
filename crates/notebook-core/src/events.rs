//! Editor events and the bus that delivers them.
//!
//! `EditorEvent` reports what the autosave pipeline did. The application
//! state follows committed writes through it, and a UI can follow the save
//! status the same way.

use crate::actions::ErrorKind;
use crate::autosave::SaveStatus;
use crate::model::{Note, NoteId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Events emitted by the autosave pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditorEvent {
    /// The projected save status changed.
    StatusChanged {
        #[serde(rename = "noteId")]
        note_id: Option<NoteId>,
        status: SaveStatus,
    },
    /// A write committed. Carries the note as stored.
    NoteSaved { note: Note },
    /// A write was refused or failed; the edit buffer is kept.
    SaveFailed {
        #[serde(rename = "noteId")]
        note_id: NoteId,
        kind: ErrorKind,
        message: String,
    },
    /// A flush found nothing to write.
    SaveSkipped {
        #[serde(rename = "noteId")]
        note_id: NoteId,
    },
    /// A response arrived after the editor had moved to another note and was
    /// dropped.
    SaveDiscarded {
        #[serde(rename = "noteId")]
        note_id: NoteId,
    },
}

type Listener = Arc<dyn Fn(&EditorEvent) + Send + Sync>;

/// Keeps a listener registered. Dropping it removes the listener.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            // Released after the lock: the listener may own other subscriptions
            let removed = bus.lock().remove(&self.id);
            drop(removed);
        }
    }
}

/// Delivers editor events to listeners, synchronously and in the order they
/// subscribed.
///
/// Listeners run on the thread that emitted the event, outside the bus lock,
/// so they may subscribe or drop subscriptions themselves.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        self: &Arc<Self>,
        listener: impl Fn(&EditorEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Arc::new(listener));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    pub fn emit(&self, event: EditorEvent) {
        let listeners: Vec<Listener> = self.lock().values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}
