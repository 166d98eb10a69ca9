//! Line ending helpers.
//!
//! Refactorings never normalize a file's newlines. Text they insert uses the line ending
//! the file already uses, so a CRLF file stays CRLF after a refactoring and its undo.

/// The newline sequence used by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineEnding {
    /// Unix-style LF (`'\n'`).
    #[default]
    Lf,
    /// Windows-style CRLF (`"\r\n"`).
    Crlf,
    /// Classic Mac OS CR (`'\r'`).
    Cr,
}

impl LineEnding {
    /// Detect the line ending used by `text`.
    ///
    /// Policy: the first line break in the text decides. Text without any line break is
    /// treated as [`LineEnding::Lf`].
    pub fn detect(text: &str) -> Self {
        let bytes = text.as_bytes();
        for (idx, b) in bytes.iter().enumerate() {
            match b {
                b'\n' => return Self::Lf,
                b'\r' => {
                    return if bytes.get(idx + 1) == Some(&b'\n') {
                        Self::Crlf
                    } else {
                        Self::Cr
                    };
                }
                _ => {}
            }
        }
        Self::Lf
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Convert LF-only text (e.g. a generated snippet) to this line ending.
    pub fn apply_to_text(self, text: &str) -> String {
        match self {
            Self::Lf => text.to_string(),
            Self::Crlf | Self::Cr => text.replace('\n', self.as_str()),
        }
    }
}
