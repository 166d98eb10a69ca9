use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once, OnceLock};

use parking_lot::{Mutex, MutexGuard, ReentrantMutex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

mod diagnostics;
mod schema;
mod validation;

pub use diagnostics::ConfigWarning;
pub use schema::{json_schema, json_schema_string};

/// Contents of `refract.toml`. Every table and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RefractConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub refactoring: RefactoringConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level for all Refract crates.
    ///
    /// Either a simple level (`info`, `debug`, ...) or a full `EnvFilter` directive string
    /// such as `refract.change=debug,info`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Append logs to the given file path.
    ///
    /// If the file cannot be opened, file logging is disabled while other sinks remain active.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective filter: the configured level with `RUST_LOG` merged in.
    ///
    /// An unparsable combination falls back to `RUST_LOG` alone, then to the configured level,
    /// then to `info`.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

/// Defaults applied to refactorings before any explicit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RefactoringConfig {
    /// Also rename matches in comments, Javadoc and strings (rename-style refactorings).
    #[serde(default)]
    pub update_textual_matches: bool,

    /// Declare extracted locals `final`.
    #[serde(default)]
    pub declare_final: bool,

    /// Replace every occurrence of an extracted expression, not only the selected one.
    #[serde(default = "RefactoringConfig::default_replace_all")]
    pub replace_all: bool,

    /// Maximum number of entries kept on an undo stack; the oldest are evicted first.
    /// `0` disables undo.
    #[serde(default = "RefactoringConfig::default_undo_limit")]
    pub undo_limit: usize,
}

impl RefactoringConfig {
    fn default_replace_all() -> bool {
        true
    }

    fn default_undo_limit() -> usize {
        100
    }
}

impl Default for RefactoringConfig {
    fn default() -> Self {
        Self {
            update_textual_matches: false,
            declare_final: false,
            replace_all: Self::default_replace_all(),
            undo_limit: Self::default_undo_limit(),
        }
    }
}

/// Which lexical regions the occurrence scanner searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    #[serde(default = "ScannerConfig::enabled")]
    pub comments: bool,

    #[serde(default = "ScannerConfig::enabled")]
    pub javadoc: bool,

    #[serde(default = "ScannerConfig::enabled")]
    pub strings: bool,
}

impl ScannerConfig {
    fn enabled() -> bool {
        true
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            comments: true,
            javadoc: true,
            strings: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The `Display` impl embeds a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl RefractConfig {
    /// Load a config file from TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::load_from_str(&text)?;
        tracing::debug!(target: "refract.config", path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

pub const REFRACT_CONFIG_ENV_VAR: &str = "REFRACT_CONFIG_PATH";

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the config environment lock.
///
/// Tests that set [`REFRACT_CONFIG_ENV_VAR`] wrap the mutation and the discovery in this
/// helper so concurrent discovery in other threads does not observe the override.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Discover the configuration file for a workspace root.
///
/// Search order:
/// 1) `REFRACT_CONFIG_PATH` (absolute or relative to `workspace_root`)
/// 2) `refract.toml` in `workspace_root`
/// 3) `.refract.toml` in `workspace_root`
pub fn discover_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(REFRACT_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            workspace_root.join(candidate)
        };
        return Some(path.canonicalize().unwrap_or(path));
    }

    ["refract.toml", ".refract.toml"]
        .into_iter()
        .map(|name| workspace_root.join(name))
        .find(|path| path.is_file())
        .map(|path| path.canonicalize().unwrap_or(path))
}

/// Load the configuration for a workspace root.
///
/// If no config is present, returns [`RefractConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(RefractConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(workspace_root) else {
        tracing::debug!(target: "refract.config", root = %workspace_root.display(), "no config file, using defaults");
        return Ok((RefractConfig::default(), None));
    };

    let config = RefractConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

#[derive(Clone)]
struct FileMakeWriter {
    file: Arc<Mutex<File>>,
}

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        FileWriter {
            guard: self.file.lock(),
        }
    }
}

struct FileWriter<'a> {
    guard: MutexGuard<'a, File>,
}

impl Write for FileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.flush()
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber described by `config`.
///
/// Only the first call in a process does anything; it returns whether a subscriber was
/// installed. Later calls return `false`.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| installed = install_subscriber(config));
    installed
}

fn install_subscriber(logging: &LoggingConfig) -> bool {
    let filter = logging.env_filter();

    let file = logging.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    let file_open_failed = logging.file.is_some() && file.is_none();

    let mut make_writer = BoxMakeWriter::new(io::sink);
    if logging.stderr {
        // Test output capture only sees `eprint!`; `TestWriter` keeps unit tests quiet in
        // debug builds.
        make_writer = if cfg!(debug_assertions) {
            BoxMakeWriter::new(
                make_writer.and(tracing_subscriber::fmt::writer::TestWriter::with_stderr),
            )
        } else {
            BoxMakeWriter::new(make_writer.and(io::stderr))
        };
    }
    if let Some(file) = file {
        make_writer = BoxMakeWriter::new(make_writer.and(FileMakeWriter {
            file: Arc::new(Mutex::new(file)),
        }));
    }

    let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(make_writer)
            .with_ansi(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(make_writer)
            .with_ansi(false)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if file_open_failed {
        if let Some(path) = logging.file.as_ref() {
            tracing::warn!(
                target: "refract.config",
                path = %path.display(),
                "failed to open log file; file logging disabled"
            );
        }
    }
    tracing::debug!(target: "refract.config", level = %logging.level, json = logging.json, "tracing initialised");
    true
}
