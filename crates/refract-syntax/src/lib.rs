//! Token-level Java syntax for Refract.
//!
//! - [`lex`] produces a lossless token stream (every byte of the input belongs to exactly one
//!   token), classifying comments, Javadoc and literals so textual scans never confuse them
//!   with code.
//! - [`parse`] builds a lightweight declaration tree (package, imports, types, fields,
//!   methods, parameters and locals) sufficient for refactoring preconditions. It is not a
//!   full Java grammar and never fails: unrecognised regions are skipped.

mod java;
mod lexer;

pub use java::{
    parse, Block, FieldDecl, ImportDecl, LocalDecl, MethodDecl, Modifier, PackageDecl, ParamDecl,
    SourceFile, TypeDecl, TypeKind,
};
pub use lexer::{
    code_tokens, is_java_identifier_part, is_java_identifier_start, is_reserved_word, lex, Token,
    TokenKind,
};
