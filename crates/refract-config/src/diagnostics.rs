use std::fmt;

/// A non-fatal configuration problem. The configuration still loads and is used as written.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    LoggingLevelInvalid { value: String, normalized: String },
    /// Neither stderr nor a log file is enabled; log events are discarded.
    NoLogSink,
    /// `refactoring.undo_limit = 0`.
    UndoDisabled,
    /// Textual matches are requested but the scanner searches no region.
    TextualMatchesWithoutScanner,
}

impl ConfigWarning {
    /// Dotted TOML path of the offending key.
    pub fn toml_path(&self) -> &'static str {
        match self {
            ConfigWarning::LoggingLevelInvalid { .. } => "logging.level",
            ConfigWarning::NoLogSink => "logging.stderr",
            ConfigWarning::UndoDisabled => "refactoring.undo_limit",
            ConfigWarning::TextualMatchesWithoutScanner => "refactoring.update_textual_matches",
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.toml_path();
        match self {
            ConfigWarning::LoggingLevelInvalid { value, normalized } => write!(
                f,
                "{path}: `{value}` is not a valid filter (normalized to `{normalized}`); falling back to `info`"
            ),
            ConfigWarning::NoLogSink => {
                write!(f, "{path}: stderr is disabled and no log file is set; logs are discarded")
            }
            ConfigWarning::UndoDisabled => write!(f, "{path}: 0 disables undo"),
            ConfigWarning::TextualMatchesWithoutScanner => write!(
                f,
                "{path}: every scanner region is disabled, so no textual match is updated"
            ),
        }
    }
}
