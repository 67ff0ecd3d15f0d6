//! Input bounds checked before any write is attempted.

use crate::model::{NewNote, NotePatch};
use thiserror::Error;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_FOLDER_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title too long (max {MAX_TITLE_CHARS} characters)")]
    TitleTooLong,

    #[error("Description too long (max {MAX_DESCRIPTION_CHARS} characters)")]
    DescriptionTooLong,

    #[error("Folder name is required")]
    FolderNameRequired,

    #[error("Folder name too long (max {MAX_FOLDER_NAME_CHARS} characters)")]
    FolderNameTooLong,

    #[error("A folder with this name already exists")]
    DuplicateFolderName,
}

pub fn title(title: &str) -> Result<(), ValidationError> {
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong);
    }
    Ok(())
}

pub fn description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(())
}

/// Folder names are compared exactly, so surrounding whitespace is kept as
/// typed; only the length is checked here.
pub fn folder_name(name: &str) -> Result<(), ValidationError> {
    match name.chars().count() {
        0 => Err(ValidationError::FolderNameRequired),
        n if n > MAX_FOLDER_NAME_CHARS => Err(ValidationError::FolderNameTooLong),
        _ => Ok(()),
    }
}

pub fn new_note(new: &NewNote) -> Result<(), ValidationError> {
    if let Some(t) = &new.title {
        title(t)?;
    }
    if let Some(d) = &new.description {
        description(d)?;
    }
    Ok(())
}

pub fn patch(patch: &NotePatch) -> Result<(), ValidationError> {
    if let Some(t) = &patch.title {
        title(t)?;
    }
    if let Some(d) = &patch.description {
        description(d)?;
    }
    Ok(())
}
