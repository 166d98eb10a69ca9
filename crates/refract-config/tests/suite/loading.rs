use pretty_assertions::assert_eq;
use refract_config::{init_tracing, ConfigError, ConfigWarning, LoggingConfig, RefractConfig};
use tempfile::tempdir;

#[test]
fn every_key_is_optional() {
    let config = RefractConfig::load_from_str("").unwrap();
    assert_eq!(config, RefractConfig::default());
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
    assert!(config.refactoring.replace_all);
    assert!(!config.refactoring.declare_final);
    assert_eq!(config.refactoring.undo_limit, 100);
    assert!(config.scanner.comments && config.scanner.javadoc && config.scanner.strings);
    assert!(config.validate().is_empty());
}

#[test]
fn a_full_config_is_read() {
    let text = r#"
[logging]
level = "refract.change=debug,info"
json = true
stderr = false
file = "refract.log"

[refactoring]
update_textual_matches = true
declare_final = true
replace_all = false
undo_limit = 20

[scanner]
javadoc = false
"#;
    let config = RefractConfig::load_from_str(text).unwrap();
    assert_eq!(config.logging.level, "refract.change=debug,info");
    assert!(config.logging.json);
    assert_eq!(config.logging.file.as_deref(), Some(std::path::Path::new("refract.log")));
    assert!(config.refactoring.update_textual_matches);
    assert!(config.refactoring.declare_final);
    assert!(!config.refactoring.replace_all);
    assert_eq!(config.refactoring.undo_limit, 20);
    assert!(config.scanner.comments);
    assert!(!config.scanner.javadoc);
    assert!(config.validate().is_empty());
}

#[test]
fn unknown_keys_are_rejected() {
    for text in ["[scanner]\ncode = true\n", "[refactor]\nundo_limit = 1\n", "verbose = true\n"] {
        let err = RefractConfig::load_from_str(text).unwrap_err();
        let ConfigError::Toml(message) = err else {
            panic!("expected a toml error for {text:?}");
        };
        assert!(message.contains("unknown field"), "{message}");
    }
}

#[test]
fn parse_errors_do_not_echo_the_input() {
    let err = RefractConfig::load_from_str("[logging]\nlevel = \"debug\"\njson = \"sometimes\"\n")
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("failed to parse toml config: "), "{message}");
    assert!(!message.contains("json = "), "{message}");
}

#[test]
fn unreadable_files_report_the_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let err = RefractConfig::load_from_path(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("missing.toml"));
}

#[test]
fn suspicious_settings_are_warned_about() {
    let text = r#"
[logging]
level = "refract.change=loud"
stderr = false

[refactoring]
update_textual_matches = true
undo_limit = 0

[scanner]
comments = false
javadoc = false
strings = false
"#;
    let warnings = RefractConfig::load_from_str(text).unwrap().validate();
    assert_eq!(
        warnings,
        [
            ConfigWarning::LoggingLevelInvalid {
                value: "refract.change=loud".to_owned(),
                normalized: "refract.change=loud".to_owned(),
            },
            ConfigWarning::NoLogSink,
            ConfigWarning::UndoDisabled,
            ConfigWarning::TextualMatchesWithoutScanner,
        ]
    );
    assert_eq!(warnings[2].to_string(), "refactoring.undo_limit: 0 disables undo");
}

#[test]
fn tracing_is_installed_once() {
    let dir = tempdir().unwrap();
    let logging = LoggingConfig {
        level: "debug".to_owned(),
        stderr: false,
        file: Some(dir.path().join("refract.log")),
        ..LoggingConfig::default()
    };
    let first = init_tracing(&logging);
    assert!(!init_tracing(&logging));
    if first {
        tracing::info!(target: "refract.test", "hello from the config tests");
        let log = std::fs::read_to_string(dir.path().join("refract.log")).unwrap();
        assert!(log.contains("hello from the config tests"), "{log}");
    }
}
