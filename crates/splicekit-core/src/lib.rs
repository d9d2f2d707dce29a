//! SpliceKit Core
//!
//! Editing and orchestration core of the SpliceKit video editor.
//! Contains the timeline model (tracks, clips, stickers), the undoable
//! command system, and the background task queue that runs long jobs
//! (subtitle removal, transcription, export) off the editing thread.
//!
//! Everything that touches a [`timeline::Timeline`] is single-threaded by
//! contract. Results computed on worker threads come back as
//! [`jobs::TaskEvent`]s and are applied through [`session::EditSession`].

pub mod commands;
pub mod fs;
pub mod jobs;
pub mod session;
pub mod settings;
pub mod timeline;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_destructive;
