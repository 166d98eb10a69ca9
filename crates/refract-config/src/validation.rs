use crate::diagnostics::ConfigWarning;
use crate::{LoggingConfig, RefractConfig};

impl RefractConfig {
    /// Semantic checks that a schema cannot express. Reports every problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut out = Vec::new();
        validate_logging(self, &mut out);
        validate_refactoring(self, &mut out);
        out
    }
}

fn validate_logging(config: &RefractConfig, out: &mut Vec<ConfigWarning>) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }

    if !config.logging.stderr && config.logging.file.is_none() {
        out.push(ConfigWarning::NoLogSink);
    }
}

fn validate_refactoring(config: &RefractConfig, out: &mut Vec<ConfigWarning>) {
    if config.refactoring.undo_limit == 0 {
        out.push(ConfigWarning::UndoDisabled);
    }

    let scanner = config.scanner;
    if config.refactoring.update_textual_matches
        && !(scanner.comments || scanner.javadoc || scanner.strings)
    {
        out.push(ConfigWarning::TextualMatchesWithoutScanner);
    }
}
