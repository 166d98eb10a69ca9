use std::path::Path;

use pretty_assertions::assert_eq;
use refract_config::{
    discover_config_path, load_for_workspace, with_config_env_lock, RefractConfig,
    REFRACT_CONFIG_ENV_VAR,
};
use refract_test_utils::{env_lock, EnvVarGuard};
use tempfile::tempdir;

#[test]
fn discovers_refract_toml_in_workspace_root() {
    let _lock = env_lock();
    let _env = EnvVarGuard::unset(REFRACT_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("refract.toml");
    std::fs::write(&config_path, "[scanner]\nstrings = false\n").unwrap();

    let discovered = discover_config_path(dir.path()).expect("refract.toml should be discovered");
    assert_eq!(discovered, config_path.canonicalize().unwrap_or(config_path));
}

#[test]
fn hidden_config_is_the_fallback() {
    let _lock = env_lock();
    let _env = EnvVarGuard::unset(REFRACT_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let hidden = dir.path().join(".refract.toml");
    std::fs::write(&hidden, "").unwrap();
    assert_eq!(
        discover_config_path(dir.path()),
        Some(hidden.canonicalize().unwrap_or(hidden))
    );

    let visible = dir.path().join("refract.toml");
    std::fs::write(&visible, "").unwrap();
    assert_eq!(
        discover_config_path(dir.path()),
        Some(visible.canonicalize().unwrap_or(visible))
    );
}

#[test]
fn env_override_wins_over_workspace_file() {
    let _lock = env_lock();

    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("refract.toml"), "[refactoring]\nundo_limit = 5\n").unwrap();
    let override_path = dir.path().join("override.toml");
    std::fs::write(&override_path, "[refactoring]\nundo_limit = 7\n").unwrap();

    let (config, path) = with_config_env_lock(|| {
        let _env = EnvVarGuard::set(REFRACT_CONFIG_ENV_VAR, &override_path);
        load_for_workspace(dir.path()).expect("config should load")
    });
    assert_eq!(config.refactoring.undo_limit, 7);
    assert_eq!(path, Some(override_path.canonicalize().unwrap_or(override_path)));
}

#[test]
fn relative_env_override_resolves_against_the_workspace_root() {
    let _lock = env_lock();

    let dir = tempdir().unwrap();
    std::fs::create_dir(dir.path().join("conf")).unwrap();
    let config_path = dir.path().join("conf").join("refract.toml");
    std::fs::write(&config_path, "").unwrap();

    let discovered = with_config_env_lock(|| {
        let _env = EnvVarGuard::set(REFRACT_CONFIG_ENV_VAR, Path::new("conf/refract.toml"));
        discover_config_path(dir.path())
    });
    assert_eq!(discovered, Some(config_path.canonicalize().unwrap_or(config_path)));
}

#[test]
fn missing_config_yields_defaults() {
    let _lock = env_lock();
    let _env = EnvVarGuard::unset(REFRACT_CONFIG_ENV_VAR);

    let dir = tempdir().unwrap();
    let (config, path) = load_for_workspace(dir.path()).unwrap();
    assert_eq!(config, RefractConfig::default());
    assert_eq!(path, None);
}
