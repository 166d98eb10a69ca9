//! Whole-word occurrence search restricted to comments, Javadoc and string literals.
//!
//! Code tokens are never matched; the scanner is used for "update textual matches" options.

use refract_core::{TextRange, TextSize};
use refract_syntax::{is_java_identifier_part, lex, TokenKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCategory {
    Javadoc,
    Comment,
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanMatch {
    pub offset: TextSize,
    pub length: TextSize,
    pub category: MatchCategory,
}

impl ScanMatch {
    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.length)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFlags {
    pub comments: bool,
    pub javadoc: bool,
    pub strings: bool,
}

impl Default for ScanFlags {
    fn default() -> Self {
        Self {
            comments: true,
            javadoc: true,
            strings: true,
        }
    }
}

/// Matches grouped by category, each in ascending offset order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub javadoc: Vec<ScanMatch>,
    pub comments: Vec<ScanMatch>,
    pub strings: Vec<ScanMatch>,
}

impl ScanResult {
    pub fn total(&self) -> usize {
        self.javadoc.len() + self.comments.len() + self.strings.len()
    }

    /// All matches in ascending offset order.
    pub fn all(&self) -> Vec<ScanMatch> {
        let mut all: Vec<ScanMatch> = self
            .javadoc
            .iter()
            .chain(&self.comments)
            .chain(&self.strings)
            .copied()
            .collect();
        all.sort_by_key(|m| m.offset);
        all
    }
}

#[derive(Clone, Debug)]
pub struct RefactoringScanner {
    pattern: String,
    flags: ScanFlags,
}

impl RefactoringScanner {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            flags: ScanFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: ScanFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_analyze_comments(&mut self, on: bool) {
        self.flags.comments = on;
    }

    pub fn set_analyze_javadoc(&mut self, on: bool) {
        self.flags.javadoc = on;
    }

    pub fn set_analyze_strings(&mut self, on: bool) {
        self.flags.strings = on;
    }

    pub fn flags(&self) -> ScanFlags {
        self.flags
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn scan(&self, text: &str) -> ScanResult {
        let mut result = ScanResult::default();
        if self.pattern.is_empty() {
            return result;
        }
        for token in lex(text) {
            let (category, enabled, out) = match token.kind {
                TokenKind::DocComment => (MatchCategory::Javadoc, self.flags.javadoc, &mut result.javadoc),
                TokenKind::LineComment | TokenKind::BlockComment => {
                    (MatchCategory::Comment, self.flags.comments, &mut result.comments)
                }
                TokenKind::StringLiteral | TokenKind::TextBlock => {
                    (MatchCategory::String, self.flags.strings, &mut result.strings)
                }
                _ => continue,
            };
            if !enabled {
                continue;
            }
            let base = token.start();
            for offset in whole_word_matches(token.text(text), &self.pattern) {
                out.push(ScanMatch {
                    offset: TextSize::from((base + offset) as u32),
                    length: TextSize::from(self.pattern.len() as u32),
                    category,
                });
            }
        }
        tracing::trace!(target: "refract.refactor", pattern = %self.pattern, matches = result.total(), "scanned");
        result
    }
}

/// Scan `text` for `pattern` with the given flags.
pub fn scan(text: &str, pattern: &str, flags: ScanFlags) -> ScanResult {
    RefactoringScanner::new(pattern).with_flags(flags).scan(text)
}

/// Byte offsets of occurrences of `pattern` in `haystack` not adjacent to identifier characters.
fn whole_word_matches(haystack: &str, pattern: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(pattern) {
        let start = from + pos;
        let end = start + pattern.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        if !before.is_some_and(is_java_identifier_part) && !after.is_some_and(is_java_identifier_part) {
            out.push(start);
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    out
}
