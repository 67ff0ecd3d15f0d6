//! The debounce timer and the write path behind it.

use super::status::StatusProjector;
use super::{AutoSaveConfig, SaveRequest, SaveStatus, SaveTarget, change};
use crate::actions::ActionError;
use crate::events::{EditorEvent, EventBus};
use crate::model::{Note, NoteContent, NoteId, Snapshot, Timestamp};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The note currently open for editing.
struct Editor {
    note_id: NoteId,
    /// Last content confirmed by the gateway. Changes only on open, rebase
    /// and successful writes.
    snapshot: Snapshot,
    buffer: NoteContent,
}

struct PendingSave {
    ticket: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct Session {
    /// Bumped whenever the open note changes. Timers and responses carry the
    /// generation they were started under and are ignored once it moves on.
    generation: u64,
    editor: Option<Editor>,
    /// At most one armed timer.
    pending: Option<PendingSave>,
    next_ticket: u64,
    /// Writes started under the current generation that have not answered.
    in_flight: usize,
    /// Why the last write failed; cleared by the next success or note switch.
    last_error: Option<ActionError>,
}

impl Session {
    fn is_busy(&self) -> bool {
        self.pending.is_some() || self.in_flight > 0
    }

    fn note_id(&self) -> Option<NoteId> {
        self.editor.as_ref().map(|e| e.note_id)
    }

    fn disarm(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }
}

struct Inner {
    target: Arc<dyn SaveTarget>,
    config: AutoSaveConfig,
    session: Mutex<Session>,
    /// Serializes writes: a flush that fires while another write is in
    /// flight waits for its response.
    write_lock: tokio::sync::Mutex<()>,
    status: StatusProjector,
    events: Arc<EventBus>,
}

/// Debounced autosave for a single editor.
///
/// [`open`](Self::open) a note, then call [`schedule`](Self::schedule) with
/// the full buffer after every edit. Once edits pause for the configured
/// debounce, the fields that differ from the last confirmed snapshot are
/// written through the [`SaveTarget`].
///
/// Event callbacks run synchronously on the thread that produced the event
/// and must not call back into the scheduler.
pub struct SaveScheduler {
    inner: Arc<Inner>,
}

impl SaveScheduler {
    pub fn new(target: Arc<dyn SaveTarget>, config: AutoSaveConfig) -> Self {
        Self::with_events(target, config, Arc::new(EventBus::new()))
    }

    /// Scheduler publishing to an existing event bus.
    pub fn with_events(
        target: Arc<dyn SaveTarget>,
        config: AutoSaveConfig,
        events: Arc<EventBus>,
    ) -> Self {
        let status = StatusProjector::new(Arc::clone(&events), config.saved_display);
        Self {
            inner: Arc::new(Inner {
                target,
                config,
                session: Mutex::new(Session::default()),
                write_lock: tokio::sync::Mutex::new(()),
                status,
                events,
            }),
        }
    }

    pub fn config(&self) -> AutoSaveConfig {
        self.inner.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Id of the open note.
    pub fn note_id(&self) -> Option<NoteId> {
        self.inner.lock_session().note_id()
    }

    /// Last content confirmed by the gateway for the open note.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.inner
            .lock_session()
            .editor
            .as_ref()
            .map(|e| e.snapshot.clone())
    }

    /// The edit buffer of the open note.
    pub fn buffer(&self) -> Option<NoteContent> {
        self.inner
            .lock_session()
            .editor
            .as_ref()
            .map(|e| e.buffer.clone())
    }

    /// Why the last write for the open note failed, if it did.
    pub fn last_error(&self) -> Option<ActionError> {
        self.inner.lock_session().last_error.clone()
    }

    /// Switch the editor to `note`.
    ///
    /// Any pending timer is dropped without flushing. A write still in flight
    /// for the previous note completes, but its response no longer touches
    /// the editor.
    pub fn open(&self, note: &Note) {
        let mut session = self.inner.lock_session();
        if session.disarm() {
            debug!("Dropped pending save on switch to note {}", note.id);
        }
        session.generation = session.generation.wrapping_add(1);
        session.in_flight = 0;
        session.last_error = None;
        session.editor = Some(Editor {
            note_id: note.id,
            snapshot: Snapshot::of(note),
            buffer: note.content(),
        });
        self.inner.status.settled(Some(note.id), false);
        debug!("Opened note {} (generation {})", note.id, session.generation);
    }

    /// Close the editor. Same cancellation rules as [`open`](Self::open).
    pub fn close(&self) {
        let mut session = self.inner.lock_session();
        session.disarm();
        session.generation = session.generation.wrapping_add(1);
        session.in_flight = 0;
        session.last_error = None;
        if let Some(editor) = session.editor.take() {
            debug!("Closed note {}", editor.note_id);
        }
        self.inner.status.settled(None, false);
    }

    /// Record the latest buffer and restart the debounce timer.
    ///
    /// If the buffer matches the snapshot and no write is in flight, nothing
    /// is scheduled and an armed timer is dropped.
    pub fn schedule(&self, buffer: NoteContent) {
        let mut session = self.inner.lock_session();
        let Some(editor) = session.editor.as_mut() else {
            debug!("No note open, ignoring edit");
            return;
        };
        editor.buffer = buffer;
        let note_id = editor.note_id;
        let dirty = change::needs_save(&editor.buffer, &editor.snapshot.content);

        if !dirty && session.in_flight == 0 {
            let dropped = session.disarm();
            if dropped {
                debug!("Edits to note {} reverted, dropped pending save", note_id);
            }
            // A buffer back at the snapshot with nothing queued is idle, even
            // after a failed write.
            if dropped || self.inner.status.current() == SaveStatus::Error {
                self.inner.status.settled(Some(note_id), false);
            }
            return;
        }

        self.inner.arm(&mut session, note_id);
    }

    /// Drop the pending timer without flushing. The buffer is kept.
    pub fn cancel(&self) {
        let mut session = self.inner.lock_session();
        if session.disarm() {
            let note_id = session.note_id();
            debug!("Cancelled pending save");
            self.inner.status.settled(note_id, session.in_flight > 0);
        }
    }

    /// Adopt `note` as the confirmed snapshot while keeping the local buffer.
    ///
    /// Resolves a conflict in favour of the local edits: the next write is
    /// checked against `note.updated_at` and overwrites the stored content.
    /// Ignored if `note` is not the open note.
    pub fn rebase(&self, note: &Note) {
        let mut session = self.inner.lock_session();
        let Some(editor) = session.editor.as_mut() else {
            return;
        };
        if editor.note_id != note.id {
            return;
        }
        editor.snapshot = Snapshot::of(note);
        let dirty = change::needs_save(&editor.buffer, &editor.snapshot.content);
        info!("Rebased note {} onto {}", note.id, note.updated_at);

        if dirty {
            self.inner.arm(&mut session, note.id);
        } else if !session.is_busy() {
            self.inner.status.settled(Some(note.id), false);
        }
    }

    /// Follow a change to the open note that left its content alone but
    /// advanced `updated_at`, such as a move to another folder.
    ///
    /// `before` is the stored timestamp just ahead of that change. The new
    /// timestamp is adopted only if the snapshot was already at `before`;
    /// otherwise someone else wrote in between and the snapshot is kept so
    /// the next write reports the conflict. Returns whether it was adopted.
    pub fn follow(&self, before: Timestamp, after: &Note) -> bool {
        let mut session = self.inner.lock_session();
        let Some(editor) = session.editor.as_mut() else {
            return false;
        };
        if editor.note_id != after.id || editor.snapshot.updated_at != Some(before) {
            return false;
        }
        editor.snapshot.updated_at = Some(after.updated_at);
        debug!("Note {} now at {}", after.id, after.updated_at);
        true
    }

    /// Wait until nothing is pending or in flight and return the status the
    /// editor settled on.
    pub async fn wait_settled(&self) -> SaveStatus {
        let mut rx = self.inner.status.subscribe();
        match rx.wait_for(|status| !status.is_busy()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.inner.lock_session().disarm();
    }
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the armed timer with a fresh one.
    fn arm(self: &Arc<Self>, session: &mut Session, note_id: NoteId) {
        session.disarm();
        let ticket = session.next_ticket;
        session.next_ticket = session.next_ticket.wrapping_add(1);
        let generation = session.generation;

        let inner = Arc::clone(self);
        let delay = self.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush(generation, ticket).await;
        });
        session.pending = Some(PendingSave { ticket, timer });
        self.status.pending(Some(note_id));
    }

    async fn flush(&self, generation: u64, ticket: u64) {
        {
            let mut session = self.lock_session();
            let current = session.generation == generation
                && session.pending.as_ref().map(|p| p.ticket) == Some(ticket);
            if !current {
                return;
            }
            // Detach: from here on the write must not be aborted by a newer
            // schedule().
            session.pending = None;
            session.in_flight += 1;
        }

        let _write = self.write_lock.lock().await;

        let Some((request, sent)) = self.prepare(generation) else {
            return;
        };
        let note_id = request.note_id;
        debug!(
            "Saving note {} (title: {}, description: {})",
            note_id,
            request.patch.title.is_some(),
            request.patch.description.is_some()
        );

        let result = self.target.save(request).await;

        let mut session = self.lock_session();
        if session.generation != generation {
            debug!("Discarding save response for note {}, editor moved on", note_id);
            self.events.emit(EditorEvent::SaveDiscarded { note_id });
            return;
        }
        session.in_flight = session.in_flight.saturating_sub(1);
        let busy = session.is_busy();

        match result {
            Ok(note) => {
                if let Some(editor) = session.editor.as_mut() {
                    editor.snapshot = Snapshot {
                        content: sent,
                        updated_at: Some(note.updated_at),
                    };
                }
                session.last_error = None;
                self.status.succeeded(Some(note_id), busy);
                self.events.emit(EditorEvent::NoteSaved { note });
            }
            Err(e) => {
                warn!("Autosave of note {} failed: {}", note_id, e);
                self.status.failed(Some(note_id), busy);
                self.events.emit(EditorEvent::SaveFailed {
                    note_id,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                session.last_error = Some(e);
            }
        }
    }

    /// Build the write for the current buffer, or settle if there is nothing
    /// to write. Runs under the write lock so the snapshot is up to date.
    fn prepare(&self, generation: u64) -> Option<(SaveRequest, NoteContent)> {
        let mut session = self.lock_session();
        if session.generation != generation {
            return None;
        }
        let (note_id, patch, last_known_updated_at, buffer) = {
            let editor = session.editor.as_ref()?;
            (
                editor.note_id,
                change::diff(&editor.snapshot.content, &editor.buffer),
                editor.snapshot.updated_at,
                editor.buffer.clone(),
            )
        };

        if patch.is_empty() {
            session.in_flight = session.in_flight.saturating_sub(1);
            debug!("Note {} unchanged at flush, skipping write", note_id);
            self.status.settled(Some(note_id), session.is_busy());
            self.events.emit(EditorEvent::SaveSkipped { note_id });
            return None;
        }

        let request = SaveRequest {
            note_id,
            patch,
            last_known_updated_at,
        };
        Some((request, buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NoteActions;
    use crate::auth::SessionAuthenticator;
    use crate::gateway::InMemoryGateway;
    use crate::model::{NewNote, NotePatch, User};
    use std::time::Duration;

    type Actions = NoteActions<Arc<InMemoryGateway>, SessionAuthenticator>;

    async fn setup() -> (Arc<Actions>, SaveScheduler, Note) {
        let user = User {
            id: "alice".into(),
            name: "Alice".into(),
            email: None,
        };
        let actions = Arc::new(NoteActions::new(
            Arc::new(InMemoryGateway::new()),
            SessionAuthenticator::signed_in(user),
        ));
        let note = actions
            .create_note(NewNote {
                title: Some("Plan".into()),
                description: Some("draft".into()),
                folder_id: None,
            })
            .await
            .unwrap();
        let scheduler = SaveScheduler::new(actions.clone(), AutoSaveConfig::default());
        scheduler.open(&note);
        (actions, scheduler, note)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_write() {
        let (actions, scheduler, note) = setup().await;
        let revision = actions.gateway().revision();

        scheduler.schedule(NoteContent::new("Plan v2", "draft"));
        assert_eq!(scheduler.status(), SaveStatus::Saving);

        scheduler.cancel();
        assert_eq!(scheduler.status(), SaveStatus::Idle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(actions.gateway().revision(), revision);
        assert_eq!(scheduler.buffer().unwrap().title, "Plan v2");
        assert_eq!(scheduler.snapshot().unwrap(), Snapshot::of(&note));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverting_edits_drops_pending_write() {
        let (actions, scheduler, _note) = setup().await;
        let revision = actions.gateway().revision();

        scheduler.schedule(NoteContent::new("Plan!", "draft"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.schedule(NoteContent::new("Plan", "draft"));

        assert_eq!(scheduler.status(), SaveStatus::Idle);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(actions.gateway().revision(), revision);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_without_open_note_is_ignored() {
        let (_actions, scheduler, _note) = setup().await;
        scheduler.close();

        scheduler.schedule(NoteContent::new("x", "y"));

        assert_eq!(scheduler.status(), SaveStatus::Idle);
        assert!(scheduler.buffer().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebase_resolves_conflict_with_local_edits() {
        let (actions, scheduler, note) = setup().await;

        let theirs = actions
            .update_note(note.id, NotePatch::description("from elsewhere"))
            .await
            .unwrap();

        scheduler.schedule(NoteContent::new("Plan", "mine"));
        assert_eq!(scheduler.wait_settled().await, SaveStatus::Error);
        assert!(scheduler.last_error().is_some_and(|e| e.is_conflict()));

        scheduler.rebase(&theirs);
        assert_eq!(scheduler.wait_settled().await, SaveStatus::Saved);
        assert_eq!(scheduler.last_error(), None);

        let stored = actions.get_note(note.id).await.unwrap();
        assert_eq!(stored.description, "mine");
        assert_eq!(scheduler.snapshot().unwrap().updated_at, Some(stored.updated_at));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverting_after_failed_write_returns_to_idle() {
        let (actions, scheduler, note) = setup().await;
        actions
            .update_note(note.id, NotePatch::description("from elsewhere"))
            .await
            .unwrap();

        scheduler.schedule(NoteContent::new("Plan", "mine"));
        assert_eq!(scheduler.wait_settled().await, SaveStatus::Error);

        scheduler.schedule(NoteContent::new("Plan", "draft"));
        assert_eq!(scheduler.status(), SaveStatus::Idle);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            actions.get_note(note.id).await.unwrap().description,
            "from elsewhere"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_buffer_keeps_saved_status() {
        let (_actions, scheduler, _note) = setup().await;

        scheduler.schedule(NoteContent::new("Plan v2", "draft"));
        assert_eq!(scheduler.wait_settled().await, SaveStatus::Saved);

        scheduler.schedule(NoteContent::new("Plan v2", "draft"));
        assert_eq!(scheduler.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_adopts_only_seen_timestamp() {
        let (actions, scheduler, note) = setup().await;

        let work = actions.create_folder("Work").await.unwrap();
        let moved = actions.move_note(note.id, Some(work.id)).await.unwrap();
        assert!(moved.updated_at > note.updated_at);
        assert!(!scheduler.follow(moved.updated_at, &moved));
        assert!(scheduler.follow(note.updated_at, &moved));
        assert_eq!(scheduler.snapshot().unwrap().updated_at, Some(moved.updated_at));
        assert_eq!(scheduler.snapshot().unwrap().content, note.content());
        assert_eq!(scheduler.status(), SaveStatus::Idle);
    }
}
