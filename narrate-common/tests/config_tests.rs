//! Integration tests for the TOML configuration tier
//!
//! Tests that depend on the process-wide config location are marked
//! `#[serial]` so they never race with each other.

use narrate_common::config::{load_toml_config, read_toml_config, TomlConfig};
use narrate_common::Error;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_full_toml_file_parses() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
api_key = "sk-from-toml"
input_folder = "/data/in"
output_folder = "/data/out"
temp_folder = "/data/tmp"
voice = "nova"
model = "tts-1-hd"
debug = true
max_workers = 2
chunk_workers = 6
max_chunk_size = 2000
retries = 5
retry_base_ms = 250
request_timeout_secs = 30
audio_format = "opus"
base_url = "http://localhost:8080/v1"
ffmpeg_path = "/usr/local/bin/ffmpeg"
"#,
    )
    .unwrap();

    let config = read_toml_config(&path).unwrap();

    assert_eq!(config.api_key.as_deref(), Some("sk-from-toml"));
    assert_eq!(config.input_folder, Some(PathBuf::from("/data/in")));
    assert_eq!(config.voice.as_deref(), Some("nova"));
    assert_eq!(config.debug, Some(true));
    assert_eq!(config.max_workers, Some(2));
    assert_eq!(config.chunk_workers, Some(6));
    assert_eq!(config.max_chunk_size, Some(2000));
    assert_eq!(config.audio_format.as_deref(), Some("opus"));
    assert_eq!(config.ffmpeg_path, Some(PathBuf::from("/usr/local/bin/ffmpeg")));
}

#[test]
fn test_partial_toml_leaves_other_fields_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "voice = \"echo\"\n").unwrap();

    let config = read_toml_config(&path).unwrap();

    assert_eq!(
        config,
        TomlConfig {
            voice: Some("echo".to_string()),
            ..TomlConfig::default()
        }
    );
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "max_workers = \"lots\"\n").unwrap();

    let result = read_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_missing_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let result = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
#[cfg(target_os = "linux")]
fn test_missing_default_file_yields_empty_config() {
    // Point the platform config dir at an empty location
    let temp_dir = TempDir::new().unwrap();
    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

    let result = load_toml_config(None);

    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(result.unwrap(), TomlConfig::default());
}
