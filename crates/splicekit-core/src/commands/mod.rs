//! Edit Command System
//!
//! Every timeline mutation made by the editing session goes through a
//! [`Command`] executed by [`History`], so it can be undone and redone.

mod clip;
mod history;
mod traits;

pub use clip::*;
pub use history::*;
pub use traits::*;
