//! notebook-cli library: configuration, the JSON file gateway and the
//! command implementations, exposed for integration tests.

pub mod commands;
pub mod config;
pub mod file_gateway;

pub use commands::{Command, FolderCommand, NoteCommand, Output};
pub use config::Config;
pub use file_gateway::JsonFileGateway;
