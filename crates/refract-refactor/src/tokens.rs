use std::ops::Range;

use refract_core::{TextRange, TextSize};
use refract_syntax::{code_tokens, Token, TokenKind};

/// Non-trivia tokens of a source text with neighbour queries.
pub(crate) struct CodeTokens<'a> {
    pub(crate) text: &'a str,
    pub(crate) tokens: Vec<Token>,
}

impl<'a> CodeTokens<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: code_tokens(text),
        }
    }

    pub(crate) fn get(&self, idx: usize) -> Option<Token> {
        self.tokens.get(idx).copied()
    }

    pub(crate) fn text_at(&self, idx: usize) -> Option<&'a str> {
        self.get(idx).map(|t| t.text(self.text))
    }

    pub(crate) fn prev_text(&self, idx: usize) -> Option<&'a str> {
        idx.checked_sub(1).and_then(|i| self.text_at(i))
    }

    pub(crate) fn next_text(&self, idx: usize) -> Option<&'a str> {
        self.text_at(idx + 1)
    }

    /// Number of adjacent `>` tokens starting at `idx`; the lexer splits `>>` and `>>>`.
    pub(crate) fn gt_run(&self, idx: usize) -> usize {
        let mut len = 0;
        while self.text_at(idx + len) == Some(">")
            && (len == 0 || self.tokens[idx + len - 1].range.end() == self.tokens[idx + len].range.start())
        {
            len += 1;
        }
        len
    }

    /// The binary operator at `idx`, joining a `>>`/`>>>` run back into one shift.
    pub(crate) fn operator_at(&self, idx: usize) -> Option<&'a str> {
        match self.gt_run(idx) {
            2 => Some(">>"),
            3 => Some(">>>"),
            _ => self.text_at(idx),
        }
    }

    /// Index of the token starting exactly at `offset`.
    pub(crate) fn index_at(&self, offset: TextSize) -> Option<usize> {
        self.tokens
            .binary_search_by_key(&offset, |t| t.range.start())
            .ok()
    }

    /// Indices of the tokens fully inside `range`.
    pub(crate) fn indices_in(&self, range: TextRange) -> Range<usize> {
        let start = self
            .tokens
            .partition_point(|t| t.range.start() < range.start());
        let end = self.tokens.partition_point(|t| t.range.end() <= range.end());
        start..end.max(start)
    }

    /// The identifier token covering `range`, if `range` lies within a single identifier.
    pub(crate) fn identifier_at(&self, range: TextRange) -> Option<usize> {
        self.tokens.iter().position(|t| {
            t.kind == TokenKind::Identifier
                && if range.is_empty() {
                    t.range.contains_inclusive(range.start())
                } else {
                    t.range.contains_range(range)
                }
        })
    }

    pub(crate) fn is_ident(&self, idx: usize, name: &str) -> bool {
        self.get(idx).is_some_and(|t| t.is_ident(self.text, name))
    }

    /// `x.name` (any qualifier, including `this`).
    pub(crate) fn is_qualified(&self, idx: usize) -> bool {
        self.prev_text(idx) == Some(".")
    }

    /// `this.name`.
    pub(crate) fn is_this_qualified(&self, idx: usize) -> bool {
        self.is_qualified(idx) && idx >= 2 && self.text_at(idx - 2) == Some("this")
    }

    /// `name(`.
    pub(crate) fn is_call(&self, idx: usize) -> bool {
        self.next_text(idx) == Some("(")
    }

    /// Identifier tokens named `name` inside `range` that are neither qualified (except by
    /// `this` when `allow_this`) nor method calls.
    pub(crate) fn simple_name_refs(
        &self,
        name: &str,
        range: TextRange,
        allow_this: bool,
    ) -> Vec<usize> {
        self.indices_in(range)
            .filter(|&idx| self.is_ident(idx, name))
            .filter(|&idx| !self.is_call(idx))
            .filter(|&idx| !self.is_qualified(idx) || (allow_this && self.is_this_qualified(idx)))
            .collect()
    }

    /// Index of the matching closer for the opener at `open`.
    pub(crate) fn matching_close(&self, open: usize) -> Option<usize> {
        let opener = self.text_at(open)?;
        let closer = match opener {
            "(" => ")",
            "[" => "]",
            "{" => "}",
            _ => return None,
        };
        let mut depth = 0usize;
        for idx in open..self.tokens.len() {
            let text = self.text_at(idx)?;
            if text == opener {
                depth += 1;
            } else if text == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
        }
        None
    }

    /// Split the tokens between parentheses `open`/`close` into depth-0 comma-separated ranges.
    pub(crate) fn split_args(&self, open: usize, close: usize) -> Vec<TextRange> {
        let mut args = Vec::new();
        let mut depth = 0usize;
        let mut first: Option<usize> = None;
        let mut last = open;
        for idx in open + 1..close {
            let Some(text) = self.text_at(idx) else {
                break;
            };
            match text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                "," if depth == 0 => {
                    if let Some(first) = first.take() {
                        args.push(self.span(first, last));
                    }
                    continue;
                }
                _ => {}
            }
            first.get_or_insert(idx);
            last = idx;
        }
        if let Some(first) = first {
            args.push(self.span(first, last));
        }
        args
    }

    /// Range from the start of token `first` to the end of token `last`.
    pub(crate) fn span(&self, first: usize, last: usize) -> TextRange {
        let start = self.tokens[first].range.start();
        let end = self.tokens[last.max(first)].range.end();
        TextRange::new(start, end)
    }

    /// End index (exclusive) of the expression starting at `start`: stops before a depth-0
    /// `;`, `,`, or an unmatched closer.
    pub(crate) fn expression_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        let mut idx = start;
        while let Some(text) = self.text_at(idx) {
            match text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ";" | "," if depth == 0 => break,
                _ => {}
            }
            idx += 1;
        }
        idx
    }
}

pub(crate) const ASSIGNMENT_OPERATORS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", ">>>=",
];

pub(crate) fn is_assignment_operator(text: &str) -> bool {
    ASSIGNMENT_OPERATORS.contains(&text)
}

/// Binding strength of binary and ternary operators; higher binds tighter.
pub(crate) fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "?" | ":" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        _ => return None,
    })
}
