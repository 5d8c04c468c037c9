//! Configuration loading and root folder resolution
//!
//! Tests that touch AMBER_ROOT_FOLDER are marked #[serial] so they do not
//! race each other on the process environment.

use amber_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use amber_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module").resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/amber-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/amber-test-toml-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/amber-test-env-folder"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/amber-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/amber-test-cli-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/amber-test-cli-folder"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/amber-test-toml-folder")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/amber-test-toml-folder"));
}

#[test]
fn test_initializer_creates_missing_directory() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("amberlear.db"));
}

#[test]
fn test_load_explicit_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/srv/amberlear"
        bind_address = "0.0.0.0"
        port = 8080
        max_write_attempts = 3
        "#,
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/amberlear")));
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.max_write_attempts, 3);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("does-not-exist.toml");

    let result = TomlConfig::load_or_default(Some(&path));

    assert!(matches!(result, Err(Error::Config(_))));
}
