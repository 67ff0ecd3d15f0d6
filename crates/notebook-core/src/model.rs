//! Records owned by the persistence gateway and the client-side editing state.
//!
//! `Note` and `Folder` are the authoritative records; the gateway is the only
//! place that assigns ids and timestamps. `NoteContent` and `Snapshot` are the
//! transient copies an editor holds while a note is open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Title stored when a note is created or saved with an empty title.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Server-controlled point in time.
pub type Timestamp = DateTime<Utc>;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

record_id! {
    /// Server-assigned identifier of a note.
    NoteId
}

record_id! {
    /// Server-assigned identifier of a folder.
    FolderId
}

/// Identity of the authenticated owner of notes and folders.
///
/// Issued by the authentication service, so it is an opaque string rather
/// than a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A note as stored by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub description: String,
    /// `None` means the note is unfiled.
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    /// Advances on every committed write.
    pub updated_at: Timestamp,
}

impl Note {
    /// The editable part of the note.
    pub fn content(&self) -> NoteContent {
        NoteContent {
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }

    pub fn is_unfiled(&self) -> bool {
        self.folder_id.is_none()
    }
}

/// A folder as stored by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    /// 1–50 characters, unique per owner.
    pub name: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Editable fields of a note: the edit buffer while typing, or the content of
/// a snapshot once confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub title: String,
    pub description: String,
}

impl NoteContent {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Content last confirmed by the gateway, with the `updated_at` that came
/// back with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: NoteContent,
    /// `None` when the editor never observed a server timestamp; the
    /// conflict check is skipped in that case.
    pub updated_at: Option<Timestamp>,
}

impl Snapshot {
    /// Snapshot of a note as it was loaded.
    pub fn of(note: &Note) -> Self {
        Self {
            content: note.content(),
            updated_at: Some(note.updated_at),
        }
    }
}

/// Fields for a new note. Missing or empty title falls back to
/// [`DEFAULT_TITLE`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder_id: Option<FolderId>,
}

/// Partial update of a note. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            title: None,
            description: Some(description.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}
