use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::ElementRef;

/// Severity of a precondition finding, ordered `Ok < Info < Warning < Error < Fatal`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    severity: Severity,
    message: String,
    context: Option<ElementRef>,
}

impl StatusEntry {
    pub fn new(severity: Severity, message: impl Into<String>, context: Option<ElementRef>) -> Self {
        Self {
            severity,
            message: message.into(),
            context,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&ElementRef> {
        self.context.as_ref()
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Ordered accumulator of findings produced by the precondition checks of a refactoring.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactoringStatus {
    entries: Vec<StatusEntry>,
}

impl RefactoringStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_fatal_error_status(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add_fatal_error(message);
        status
    }

    pub fn create_error_status(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add_error(message);
        status
    }

    pub fn add_entry(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        context: Option<ElementRef>,
    ) {
        self.entries.push(StatusEntry::new(severity, message, context));
    }

    pub fn add_fatal_error(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Fatal, message, None);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Error, message, None);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Warning, message, None);
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.add_entry(Severity::Info, message, None);
    }

    /// Append `other`'s entries after this status's entries.
    pub fn merge(&mut self, other: RefactoringStatus) {
        self.entries.extend(other.entries);
    }

    pub fn severity(&self) -> Severity {
        self.entries
            .iter()
            .map(StatusEntry::severity)
            .max()
            .unwrap_or(Severity::Ok)
    }

    pub fn is_ok(&self) -> bool {
        self.severity() == Severity::Ok
    }

    pub fn has_warning(&self) -> bool {
        self.severity() >= Severity::Warning
    }

    pub fn has_error(&self) -> bool {
        self.severity() >= Severity::Error
    }

    pub fn has_fatal_error(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first entry with the highest severity.
    pub fn entry_with_highest_severity(&self) -> Option<&StatusEntry> {
        let severity = self.severity();
        self.entries.iter().find(|e| e.severity == severity)
    }

    pub fn messages_matching(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .map(StatusEntry::message)
            .collect()
    }
}

impl fmt::Display for RefactoringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("OK");
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
