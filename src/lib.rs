//! Editing core for a rich-text / plain-text mail composer.
//!
//! The [`document`] module holds the mutable tree and its path addressing,
//! [`editor`] wraps it in an [`EditorSession`] with selection, undo history,
//! reflow and the user-facing editing operations.

pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod interop;

pub use config::ComposerConfig;
pub use document::{Document, NodeId, Path, Role};
pub use editor::{
    Alignment, BlockFormat, Caret, EditorEvent, EditorSession, Mode, Selection, SelectionPoint,
    content::{ContentFlags, ContentOutputs},
    formatting::{Force, FormattingDiff, FormattingState},
};
pub use error::{EditorError, Result};
