//! Personal notes and folders with debounced, conflict-checked autosave.

pub mod actions;
pub mod auth;
pub mod autosave;
pub mod events;
pub mod gateway;
pub mod model;
pub mod store;
pub mod validation;
pub mod workspace;

pub use actions::{ActionError, ActionResponse, ActionResult, ErrorKind, NoteActions};
pub use auth::{AuthError, Authenticator, SessionAuthenticator};
pub use autosave::{AutoSaveConfig, SaveRequest, SaveScheduler, SaveStatus, SaveTarget};
pub use events::{EditorEvent, EventBus, Subscription};
pub use gateway::{GatewayError, InMemoryGateway, NoteGateway, RecordSet};
pub use model::{
    DEFAULT_TITLE, Folder, FolderId, NewNote, Note, NoteContent, NoteId, NotePatch, Snapshot,
    Timestamp, User, UserId,
};
pub use store::{Action, AppState, FolderFilter};
pub use workspace::Workspace;
