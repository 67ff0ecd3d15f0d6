//! Application state shared by the views: the loaded notes and folders, the
//! selected note and the folder filter.
//!
//! State changes only through [`AppState::apply`].

use crate::model::{Folder, FolderId, Note, NoteId};
use serde::{Deserialize, Serialize};

/// Which notes the list shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum FolderFilter {
    #[default]
    Unfiled,
    All,
    Folder(FolderId),
}

impl FolderFilter {
    pub fn matches(&self, note: &Note) -> bool {
        match self {
            FolderFilter::Unfiled => note.folder_id.is_none(),
            FolderFilter::All => true,
            FolderFilter::Folder(id) => note.folder_id == Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetNotes(Vec<Note>),
    /// Prepends, so a new note shows first.
    AddNote(Note),
    UpdateNote(Note),
    RemoveNote(NoteId),
    SelectNote(Option<NoteId>),
    /// Changing the filter clears the selected note.
    SelectFolder(FolderFilter),
    SetFolders(Vec<Folder>),
    AddFolder(Folder),
    ReplaceFolder(Folder),
    /// Notes in the folder become unfiled locally.
    RemoveFolder(FolderId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    notes: Vec<Note>,
    /// Kept sorted by name.
    folders: Vec<Folder>,
    selected_note: Option<NoteId>,
    filter: FolderFilter,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn folder(&self, id: FolderId) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn selected_note_id(&self) -> Option<NoteId> {
        self.selected_note
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.selected_note.and_then(|id| self.note(id))
    }

    pub fn filter(&self) -> FolderFilter {
        self.filter
    }

    /// Notes that pass the current filter, in list order.
    pub fn visible_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(|n| self.filter.matches(n))
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetNotes(notes) => {
                self.notes = notes;
                let selected = self.selected_note;
                if selected.is_some_and(|id| self.note(id).is_none()) {
                    self.selected_note = None;
                }
            }
            Action::AddNote(note) => self.notes.insert(0, note),
            Action::UpdateNote(note) => {
                if let Some(slot) = self.notes.iter_mut().find(|n| n.id == note.id) {
                    *slot = note;
                }
            }
            Action::RemoveNote(id) => {
                self.notes.retain(|n| n.id != id);
                if self.selected_note == Some(id) {
                    self.selected_note = None;
                }
            }
            Action::SelectNote(id) => self.selected_note = id,
            Action::SelectFolder(filter) => {
                self.filter = filter;
                self.selected_note = None;
            }
            Action::SetFolders(folders) => {
                self.folders = folders;
                self.sort_folders();
            }
            Action::AddFolder(folder) => {
                self.folders.push(folder);
                self.sort_folders();
            }
            Action::ReplaceFolder(folder) => {
                if let Some(slot) = self.folders.iter_mut().find(|f| f.id == folder.id) {
                    *slot = folder;
                    self.sort_folders();
                }
            }
            Action::RemoveFolder(id) => {
                self.folders.retain(|f| f.id != id);
                for note in self.notes.iter_mut().filter(|n| n.folder_id == Some(id)) {
                    note.folder_id = None;
                }
                if self.filter == FolderFilter::Folder(id) {
                    self.filter = FolderFilter::Unfiled;
                    self.selected_note = None;
                }
            }
        }
    }

    fn sort_folders(&mut self) {
        self.folders.sort_by(|a, b| a.name.cmp(&b.name));
    }
}
