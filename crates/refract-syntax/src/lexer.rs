use refract_core::{TextRange, TextSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    // --- Trivia ---
    Whitespace,
    /// `// ...` up to (not including) the line terminator.
    LineComment,
    /// `/* ... */`, including the empty comment `/**/`.
    BlockComment,
    /// `/** ... */`.
    DocComment,

    // --- Identifiers & literals ---
    Identifier,
    /// Reserved keywords plus the literal words `true`, `false` and `null`.
    Keyword,
    Number,
    StringLiteral,
    TextBlock,
    CharLiteral,

    /// Operators and separators. Multi-character operators are a single token, except
    /// `>>`/`>>>` which stay split so nested generic arguments close correctly.
    Punct,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::LineComment
                | TokenKind::BlockComment
                | TokenKind::DocComment
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::DocComment
        )
    }

    pub fn is_string(self) -> bool {
        matches!(self, TokenKind::StringLiteral | TokenKind::TextBlock)
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::Number
                | TokenKind::StringLiteral
                | TokenKind::TextBlock
                | TokenKind::CharLiteral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    #[inline]
    pub fn start(&self) -> usize {
        u32::from(self.range.start()) as usize
    }

    #[inline]
    pub fn end(&self) -> usize {
        u32::from(self.range.end()) as usize
    }

    #[inline]
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start()..self.end()]
    }

    pub fn is_punct(&self, src: &str, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text(src) == punct
    }

    pub fn is_keyword(&self, src: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text(src) == keyword
    }

    pub fn is_ident(&self, src: &str, ident: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text(src) == ident
    }
}

pub fn is_java_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_java_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Words that can never be used as identifiers.
pub fn is_reserved_word(word: &str) -> bool {
    matches!(
        word,
        "abstract"
            | "assert"
            | "boolean"
            | "break"
            | "byte"
            | "case"
            | "catch"
            | "char"
            | "class"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extends"
            | "final"
            | "finally"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "implements"
            | "import"
            | "instanceof"
            | "int"
            | "interface"
            | "long"
            | "native"
            | "new"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "short"
            | "static"
            | "strictfp"
            | "super"
            | "switch"
            | "synchronized"
            | "this"
            | "throw"
            | "throws"
            | "transient"
            | "try"
            | "void"
            | "volatile"
            | "while"
            | "true"
            | "false"
            | "null"
            | "_"
    )
}

// Longest first so maximal munch works with a linear scan.
const MULTI_CHAR_PUNCT: &[&str] = &[
    ">>>=", "<<=", ">>=", "...", "->", "::", "++", "--", "&&", "||", "==", "!=", "<=", ">=",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<",
];

/// Lex `text` into a lossless token stream.
///
/// Unterminated block comments and text blocks extend to the end of the input; unterminated
/// string and char literals end at the line terminator.
pub fn lex(text: &str) -> Vec<Token> {
    let mut lexer = Lexer { src: text, offset: 0 };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token() {
        tokens.push(token);
    }
    tokens
}

/// Non-trivia tokens of `text`, in order.
pub fn code_tokens(text: &str) -> Vec<Token> {
    lex(text)
        .into_iter()
        .filter(|token| !token.kind.is_trivia())
        .collect()
}

struct Lexer<'a> {
    src: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.offset).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src
            .as_bytes()
            .get(self.offset..)
            .is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn bump_char(&mut self) {
        if let Some(c) = self.peek_char() {
            self.offset += c.len_utf8();
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            range: TextRange::new(
                TextSize::from(start as u32),
                TextSize::from(self.offset as u32),
            ),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let start = self.offset;
        let c = self.peek_char()?;

        if c.is_whitespace() {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.bump_char();
            }
            return Some(self.token(TokenKind::Whitespace, start));
        }

        if self.starts_with("//") {
            while let Some(b) = self.peek_byte() {
                if b == b'\n' || b == b'\r' {
                    break;
                }
                self.bump_char();
            }
            return Some(self.token(TokenKind::LineComment, start));
        }

        if self.starts_with("/*") {
            let kind = if self.starts_with("/**") && !self.starts_with("/**/") {
                TokenKind::DocComment
            } else {
                TokenKind::BlockComment
            };
            self.offset += 2;
            loop {
                if self.offset >= self.src.len() {
                    break;
                }
                if self.starts_with("*/") {
                    self.offset += 2;
                    break;
                }
                self.bump_char();
            }
            return Some(self.token(kind, start));
        }

        if self.starts_with("\"\"\"") {
            self.offset += 3;
            while self.offset < self.src.len() {
                if self.starts_with("\\") {
                    self.offset += 1;
                    self.bump_char();
                    continue;
                }
                if self.starts_with("\"\"\"") {
                    self.offset += 3;
                    break;
                }
                self.bump_char();
            }
            return Some(self.token(TokenKind::TextBlock, start));
        }

        if c == '"' || c == '\'' {
            self.offset += 1;
            while let Some(b) = self.peek_byte() {
                match b {
                    b'\n' | b'\r' => break,
                    b'\\' => {
                        self.offset += 1;
                        if matches!(self.peek_byte(), Some(b'\n' | b'\r')) {
                            break;
                        }
                        self.bump_char();
                    }
                    _ if b == c as u8 => {
                        self.offset += 1;
                        break;
                    }
                    _ => self.bump_char(),
                }
            }
            let kind = if c == '"' {
                TokenKind::StringLiteral
            } else {
                TokenKind::CharLiteral
            };
            return Some(self.token(kind, start));
        }

        if is_java_identifier_start(c) {
            while self.peek_char().is_some_and(is_java_identifier_part) {
                self.bump_char();
            }
            let kind = if is_reserved_word(&self.src[start..self.offset]) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return Some(self.token(kind, start));
        }

        let starts_number = c.is_ascii_digit()
            || (c == '.'
                && self
                    .src
                    .as_bytes()
                    .get(self.offset + 1)
                    .is_some_and(u8::is_ascii_digit));
        if starts_number {
            self.lex_number();
            return Some(self.token(TokenKind::Number, start));
        }

        if let Some(punct) = MULTI_CHAR_PUNCT.iter().find(|p| self.starts_with(p)) {
            self.offset += punct.len();
        } else {
            self.bump_char();
        }
        Some(self.token(TokenKind::Punct, start))
    }

    fn lex_number(&mut self) {
        let is_hex = self.starts_with("0x") || self.starts_with("0X");
        let mut prev = '\0';
        while let Some(c) = self.peek_char() {
            let exponent_sign = (c == '+' || c == '-')
                && if is_hex {
                    matches!(prev, 'p' | 'P')
                } else {
                    matches!(prev, 'e' | 'E')
                };
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.offset += 1;
            } else {
                break;
            }
        }
    }
}
