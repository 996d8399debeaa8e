use lintel_config::*;
use std::fs;
use std::path::PathBuf;

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("lintel-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_toml_file_then_json_overlay() {
    let toml = temp_file(
        "base.toml",
        r#"
        [validation]
        invoke_validate_when_errors_exist = true

        [binding]
        expression_cache_capacity = 100
        "#,
    );
    let json = temp_file(
        "overlay.json",
        r#"{"binding": {"expression_cache_capacity": 50}}"#,
    );

    let manager = ConfigManager::new();
    manager.load_file(&toml, FileFormat::Toml).unwrap();
    let overlay = ConfigLoader::auto(&json).unwrap().load_file(&json).unwrap();
    manager.merge_value(overlay).unwrap();

    let settings = BootstrapSettings::from_manager(&manager).unwrap();
    assert!(settings.invoke_validate_when_errors_exist);
    assert_eq!(settings.expression_cache_capacity, 50);

    fs::remove_file(toml).ok();
    fs::remove_file(json).ok();
}

#[test]
fn test_missing_file_is_load_error() {
    let manager = ConfigManager::new();
    let result = manager.load_file("/definitely/not/here.toml", FileFormat::Toml);
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn test_env_file_format() {
    let path = temp_file("settings.env", "LOCALE__DEFAULT=pt-BR\nBINDING__DENY_ROOTS=context\n");
    let manager = ConfigManager::new();
    manager.load_file(&path, FileFormat::Env).unwrap();

    let settings = BootstrapSettings::from_manager(&manager).unwrap();
    assert_eq!(settings.default_locale, "pt-BR");
    assert_eq!(settings.deny_roots, vec!["context"]);
    fs::remove_file(path).ok();
}
