//! Change detection between the edit buffer and the last-saved snapshot.

use crate::model::{NoteContent, NotePatch};

/// Whether `buffer` differs from what was last confirmed saved.
///
/// An empty title is compared as-is; it only becomes the default title when
/// it is written.
pub fn needs_save(buffer: &NoteContent, saved: &NoteContent) -> bool {
    buffer.title != saved.title || buffer.description != saved.description
}

/// The fields of `buffer` that changed relative to `saved`.
///
/// An unchanged field stays `None`, so a write built from this patch never
/// sends back a stale copy of a field that was not edited.
pub fn diff(saved: &NoteContent, buffer: &NoteContent) -> NotePatch {
    NotePatch {
        title: (buffer.title != saved.title).then(|| buffer.title.clone()),
        description: (buffer.description != saved.description)
            .then(|| buffer.description.clone()),
    }
}
