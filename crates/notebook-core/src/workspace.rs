//! Ties the action layer, the application state and the autosave editor
//! together.
//!
//! Every successful action is mirrored into [`AppState`]; committed autosaves
//! reach it through the editor's event bus.

use crate::actions::{ActionResult, NoteActions};
use crate::auth::Authenticator;
use crate::autosave::{AutoSaveConfig, SaveScheduler, SaveStatus};
use crate::events::{EditorEvent, EventBus, Subscription};
use crate::gateway::NoteGateway;
use crate::model::{Folder, FolderId, NewNote, Note, NoteContent, NoteId};
use crate::store::{Action, AppState, FolderFilter};
use std::sync::{Arc, RwLock};
use tracing::debug;

pub struct Workspace<G, A> {
    actions: Arc<NoteActions<G, A>>,
    state: Arc<RwLock<AppState>>,
    editor: SaveScheduler,
    _saved: Subscription,
}

impl<G, A> Workspace<G, A>
where
    G: NoteGateway + 'static,
    A: Authenticator + 'static,
{
    pub fn new(actions: Arc<NoteActions<G, A>>, config: AutoSaveConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let state = Arc::new(RwLock::new(AppState::new()));

        let saved_state = Arc::clone(&state);
        let saved = events.subscribe(move |event| {
            if let EditorEvent::NoteSaved { note } = event {
                saved_state
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .apply(Action::UpdateNote(note.clone()));
            }
        });

        let editor = SaveScheduler::with_events(actions.clone(), config, events);
        Self {
            actions,
            state,
            editor,
            _saved: saved,
        }
    }

    pub fn actions(&self) -> &NoteActions<G, A> {
        &self.actions
    }

    pub fn editor(&self) -> &SaveScheduler {
        &self.editor
    }

    /// A copy of the current state.
    pub fn state(&self) -> AppState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.editor.status()
    }

    fn dispatch(&self, action: Action) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .apply(action);
    }

    /// Load notes and folders of the current user.
    pub async fn load(&self) -> ActionResult<()> {
        let notes = self.actions.list_notes().await?;
        let folders = self.actions.list_folders().await?;
        debug!("Loaded {} notes and {} folders", notes.len(), folders.len());
        self.dispatch(Action::SetNotes(notes));
        self.dispatch(Action::SetFolders(folders));
        Ok(())
    }

    /// Create a note and open it.
    pub async fn create_note(&self, new: NewNote) -> ActionResult<Note> {
        let note = self.actions.create_note(new).await?;
        self.dispatch(Action::AddNote(note.clone()));
        self.dispatch(Action::SelectNote(Some(note.id)));
        self.editor.open(&note);
        Ok(note)
    }

    pub async fn delete_note(&self, id: NoteId) -> ActionResult<()> {
        self.actions.delete_note(id).await?;
        if self.editor.note_id() == Some(id) {
            self.editor.close();
        }
        self.dispatch(Action::RemoveNote(id));
        Ok(())
    }

    /// Open a note in the editor, reloading it first so the editor starts
    /// from the stored `updated_at`. `None` closes the editor.
    pub async fn select_note(&self, id: Option<NoteId>) -> ActionResult<Option<Note>> {
        let Some(id) = id else {
            self.editor.close();
            self.dispatch(Action::SelectNote(None));
            return Ok(None);
        };

        let note = self.actions.get_note(id).await?;
        self.dispatch(Action::UpdateNote(note.clone()));
        self.dispatch(Action::SelectNote(Some(id)));
        self.editor.open(&note);
        Ok(Some(note))
    }

    /// Change the folder filter. The selected note is closed.
    pub fn select_folder(&self, filter: FolderFilter) {
        self.editor.close();
        self.dispatch(Action::SelectFolder(filter));
    }

    /// Forward the full editor buffer to autosave.
    pub fn edit(&self, content: NoteContent) {
        self.editor.schedule(content);
    }

    /// Wait for autosave to settle.
    pub async fn wait_settled(&self) -> SaveStatus {
        self.editor.wait_settled().await
    }

    /// Move a note to a folder, or out of any folder.
    ///
    /// Moving advances `updated_at`. If the note is open, the editor follows
    /// the move only when nothing else changed the note since it last saw
    /// it; otherwise its next write still reports the conflict.
    pub async fn move_note(&self, id: NoteId, folder: Option<FolderId>) -> ActionResult<Note> {
        let before = if self.editor.note_id() == Some(id) {
            Some(self.actions.get_note(id).await?)
        } else {
            None
        };

        let note = self.actions.move_note(id, folder).await?;
        self.dispatch(Action::UpdateNote(note.clone()));

        if let Some(before) = before {
            // A content change between the read and the move is not ours
            let followed = before.content() == note.content()
                && self.editor.follow(before.updated_at, &note);
            if !followed {
                debug!("Editor for note {} kept its snapshot across the move", id);
            }
        }
        Ok(note)
    }

    pub async fn create_folder(&self, name: &str) -> ActionResult<Folder> {
        let folder = self.actions.create_folder(name).await?;
        self.dispatch(Action::AddFolder(folder.clone()));
        Ok(folder)
    }

    pub async fn rename_folder(&self, id: FolderId, name: &str) -> ActionResult<Folder> {
        let folder = self.actions.rename_folder(id, name).await?;
        self.dispatch(Action::ReplaceFolder(folder.clone()));
        Ok(folder)
    }

    /// Delete a folder. Its notes stay, unfiled. If the folder was the
    /// active filter the editor is closed.
    pub async fn delete_folder(&self, id: FolderId) -> ActionResult<()> {
        self.actions.delete_folder(id).await?;
        if self.state().filter() == FolderFilter::Folder(id) {
            self.editor.close();
        }
        self.dispatch(Action::RemoveFolder(id));
        Ok(())
    }
}
