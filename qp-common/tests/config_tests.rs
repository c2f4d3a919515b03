//! Unit tests for configuration and root folder resolution
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate QP_ROOT_FOLDER or QP_ROOT are marked with #[serial].

use qp_common::config::{
    load_toml_config, write_toml_config, CompiledDefaults, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var("QP_ROOT_FOLDER");
    env::remove_var("QP_ROOT");
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("quizpipe") || defaults.root_folder.ends_with("quizpipe_data"));
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    clear_env();
    env::set_var("QP_ROOT_FOLDER", "/tmp/qp-env-folder");

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/qp-cli-folder")))
        .resolve();

    assert_eq!(root, PathBuf::from("/tmp/qp-cli-folder"));
    clear_env();
}

#[test]
#[serial]
fn test_env_var_root_folder_takes_precedence_over_root() {
    clear_env();
    env::set_var("QP_ROOT_FOLDER", "/tmp/qp-priority-1");
    env::set_var("QP_ROOT", "/tmp/qp-priority-2");

    let root = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root, PathBuf::from("/tmp/qp-priority-1"));
    clear_env();
}

#[test]
#[serial]
fn test_env_var_root_fallback() {
    clear_env();
    env::set_var("QP_ROOT", "/tmp/qp-env-root");

    let root = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root, PathBuf::from("/tmp/qp-env-root"));
    clear_env();
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    clear_env();
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/qp-toml-root")),
        ..Default::default()
    };

    let root = RootFolderResolver::new("test-module").with_toml(config).resolve();

    assert_eq!(root, PathBuf::from("/tmp/qp-toml-root"));
}

#[test]
#[serial]
fn test_no_overrides_uses_compiled_default() {
    clear_env();

    let root = RootFolderResolver::new("test-module")
        .with_toml(TomlConfig::default())
        .resolve();

    assert_eq!(root, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
fn test_initializer_paths() {
    let temp_dir = TempDir::new().unwrap();
    let init = RootFolderInitializer::new(temp_dir.path().join("root"));
    init.ensure_directory_exists().unwrap();

    assert!(temp_dir.path().join("root").is_dir());
    assert_eq!(init.database_path(), temp_dir.path().join("root/quiz.db"));
    assert_eq!(init.manifest_root(), temp_dir.path().join("root/manifests"));
    assert_eq!(
        init.production_path(),
        temp_dir.path().join("root/production/quiz_production.db")
    );
}

#[test]
fn test_initializer_production_override() {
    let init = RootFolderInitializer::new(PathBuf::from("/data/qp"))
        .with_production_path(Some(PathBuf::from("out/prod.db")));
    assert_eq!(init.production_path(), PathBuf::from("/data/qp/out/prod.db"));

    let init = RootFolderInitializer::new(PathBuf::from("/data/qp"))
        .with_production_path(Some(PathBuf::from("/srv/game/prod.db")));
    assert_eq!(init.production_path(), PathBuf::from("/srv/game/prod.db"));
}

#[test]
fn test_toml_write_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/quiz")),
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: Some(PathBuf::from("/var/log/qp.log")),
        },
        production_path: None,
    };

    write_toml_config(&config, &target).unwrap();

    assert!(target.exists());
    assert!(!temp_dir.path().join("config.toml.tmp").exists());
    assert_eq!(load_toml_config(&target).unwrap(), config);
}

#[test]
fn test_toml_missing_fields_use_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "root_folder = \"/quiz\"\n").unwrap();

    let config = load_toml_config(&target).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/quiz")));
    assert_eq!(config.logging.level, "info");
    assert!(config.production_path.is_none());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config.toml");
    std::fs::write(&target, "root_folder = [unterminated").unwrap();

    let err = load_toml_config(&target).unwrap_err();
    assert!(matches!(err, qp_common::Error::Config(_)));
}
