//! Core shared types for Refract.
//!
//! This crate is intentionally small: text ranges and line indexes, text edits and their
//! inversion, the line/column selection resolver, and the cooperative progress monitor used
//! by every refactoring stage.

mod document;
mod edit;
mod line_ending;
mod progress;
mod selection;
mod text;

pub use document::Document;
pub use edit::{apply_text_edits, invert_text_edits, normalize_text_edits, EditError, TextEdit};
pub use line_ending::LineEnding;
pub use progress::{Cancelled, ProgressMonitor};
pub use selection::{LineColumnSelection, SelectionError};
pub use text::{LineCol, LineIndex, TextRange, TextSize};

/// Identifier for a workspace file.
///
/// File ids are workspace-relative paths using `/` separators (`src/p/A.java`).
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment (`A.java` for `src/p/A.java`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the final path segment, without the trailing `/`.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
