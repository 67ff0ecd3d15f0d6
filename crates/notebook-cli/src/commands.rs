//! Subcommands and how they run against a workspace.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use notebook_core::{
    ActionError, ActionResult, Authenticator, Folder, FolderFilter, FolderId, NewNote, Note,
    NoteGateway, NoteId, SaveStatus, Workspace,
};
use serde::Serialize;
use std::fmt::Write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create, list, edit and delete notes
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },
    /// Create, list, rename and delete folders
    Folder {
        #[command(subcommand)]
        command: FolderCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Create a note
    New {
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Folder to file the note in
        #[arg(long)]
        folder: Option<FolderId>,
    },
    /// List notes, most recently updated first
    List {
        /// Only notes in this folder
        #[arg(long, conflicts_with = "unfiled")]
        folder: Option<FolderId>,
        /// Only notes in no folder
        #[arg(long)]
        unfiled: bool,
        /// Only notes updated after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
    /// Show one note
    Show { id: NoteId },
    /// Change the title and/or description, saved through autosave
    Edit {
        id: NoteId,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Move a note into a folder, or out of any folder if none is given
    Mv { id: NoteId, folder: Option<FolderId> },
    /// Delete a note
    Rm { id: NoteId },
}

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    /// Create a folder
    New { name: String },
    /// List folders by name
    List,
    /// Rename a folder
    Rename { id: FolderId, name: String },
    /// Delete a folder; its notes become unfiled
    Rm { id: FolderId },
}

/// What a command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Note(Note),
    Notes(Vec<Note>),
    Folder(Folder),
    Folders(Vec<Folder>),
    Done,
}

pub async fn run<G, A>(workspace: &Workspace<G, A>, command: Command) -> ActionResult<Output>
where
    G: NoteGateway + 'static,
    A: Authenticator + 'static,
{
    let actions = workspace.actions();
    match command {
        Command::Note { command } => match command {
            NoteCommand::New {
                title,
                description,
                folder,
            } => {
                let new = NewNote {
                    title,
                    description,
                    folder_id: folder,
                };
                Ok(Output::Note(workspace.create_note(new).await?))
            }
            NoteCommand::List {
                folder,
                unfiled,
                since,
            } => {
                workspace.load().await?;
                let filter = match (folder, unfiled) {
                    (Some(id), _) => FolderFilter::Folder(id),
                    (None, true) => FolderFilter::Unfiled,
                    (None, false) => FolderFilter::All,
                };
                workspace.select_folder(filter);
                let notes: Vec<Note> = workspace
                    .state()
                    .visible_notes()
                    .filter(|n| since.is_none_or(|after| n.updated_at > after))
                    .cloned()
                    .collect();
                Ok(Output::Notes(notes))
            }
            NoteCommand::Show { id } => Ok(Output::Note(actions.get_note(id).await?)),
            NoteCommand::Edit {
                id,
                title,
                description,
            } => edit(workspace, id, title, description).await.map(Output::Note),
            NoteCommand::Mv { id, folder } => {
                Ok(Output::Note(workspace.move_note(id, folder).await?))
            }
            NoteCommand::Rm { id } => {
                workspace.delete_note(id).await?;
                Ok(Output::Done)
            }
        },
        Command::Folder { command } => match command {
            FolderCommand::New { name } => Ok(Output::Folder(workspace.create_folder(&name).await?)),
            FolderCommand::List => Ok(Output::Folders(actions.list_folders().await?)),
            FolderCommand::Rename { id, name } => {
                Ok(Output::Folder(workspace.rename_folder(id, &name).await?))
            }
            FolderCommand::Rm { id } => {
                workspace.delete_folder(id).await?;
                Ok(Output::Done)
            }
        },
    }
}

/// Open the note, apply the given fields to its buffer and wait for the
/// autosave to settle.
async fn edit<G, A>(
    workspace: &Workspace<G, A>,
    id: NoteId,
    title: Option<String>,
    description: Option<String>,
) -> ActionResult<Note>
where
    G: NoteGateway + 'static,
    A: Authenticator + 'static,
{
    let Some(note) = workspace.select_note(Some(id)).await? else {
        return Err(ActionError::NotFoundOrForbidden);
    };

    let mut buffer = note.content();
    if let Some(title) = title {
        buffer.title = title;
    }
    if let Some(description) = description {
        buffer.description = description;
    }
    workspace.edit(buffer);

    match workspace.wait_settled().await {
        SaveStatus::Error => Err(workspace
            .editor()
            .last_error()
            .unwrap_or_else(|| ActionError::Transient("autosave failed".to_string()))),
        _ => Ok(workspace.state().note(id).cloned().unwrap_or(note)),
    }
}

/// Human-readable rendering of an output.
pub fn render(output: &Output) -> String {
    let mut out = String::new();
    match output {
        Output::Note(note) => {
            let _ = writeln!(out, "{}  {}", note.id, note.title);
            let _ = writeln!(out, "updated {}", note.updated_at.to_rfc3339());
            if let Some(folder) = note.folder_id {
                let _ = writeln!(out, "folder  {}", folder);
            }
            if !note.description.is_empty() {
                let _ = writeln!(out, "\n{}", note.description);
            }
        }
        Output::Notes(notes) => {
            for note in notes {
                let _ = writeln!(
                    out,
                    "{}  {}  {}",
                    note.id,
                    note.updated_at.format("%Y-%m-%d %H:%M"),
                    note.title
                );
            }
        }
        Output::Folder(folder) => {
            let _ = writeln!(out, "{}  {}", folder.id, folder.name);
        }
        Output::Folders(folders) => {
            for folder in folders {
                let _ = writeln!(out, "{}  {}", folder.id, folder.name);
            }
        }
        Output::Done => {}
    }
    out
}
