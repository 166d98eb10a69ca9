use crate::{LineEnding, LineIndex, TextRange, TextSize};

/// A text snapshot together with its line index and line-ending convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    text: String,
    line_index: LineIndex,
    line_ending: LineEnding,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        let line_ending = LineEnding::detect(&text);
        Self {
            text,
            line_index,
            line_ending,
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    #[inline]
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn len(&self) -> TextSize {
        self.line_index.text_len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text covered by `range`, or `None` if the range is out of bounds or not on char
    /// boundaries.
    pub fn slice(&self, range: TextRange) -> Option<&str> {
        self.text
            .get(u32::from(range.start()) as usize..u32::from(range.end()) as usize)
    }

    /// Text of the zero-based `line`, excluding its terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        self.slice(self.line_index.line_range(line)?)
    }

    pub fn into_text(self) -> String {
        self.text
    }
}
