// Configuration file and environment override tests.
//
// Tests that touch the process environment take ENV_LOCK so they never
// run concurrently.

use companion_client::ClientConfig;
use std::env;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "COMPANION_CONFIG_DIR",
    "COMPANION_URL",
    "COMPANION_RECONNECT_DELAY_MS",
    "COMPANION_FRAME_INTERVAL_MS",
];

/// Sets environment variables for one test and clears them on drop.
struct EnvGuard;

impl EnvGuard {
    fn new() -> Self {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
        Self
    }

    fn set(&self, key: &str, value: &str) {
        env::set_var(key, value);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }
}

#[test]
fn test_save_and_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = ClientConfig {
        url: Some("ws://127.0.0.1:9450".to_string()),
        reconnect_delay_ms: 1000,
        frame_interval_ms: 8,
    };
    config.save_to(&path).unwrap();

    assert_eq!(ClientConfig::load_from(&path).unwrap(), config);
}

#[test]
fn test_load_from_invalid_json_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(ClientConfig::load_from(&path).is_err());
}

#[test]
fn test_load_uses_config_dir_override_and_env() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let guard = EnvGuard::new();
    let dir = TempDir::new().unwrap();
    guard.set("COMPANION_CONFIG_DIR", dir.path().to_str().unwrap());

    // No file yet: defaults.
    assert_eq!(ClientConfig::load().unwrap(), ClientConfig::default());

    // File values are picked up.
    let saved = ClientConfig {
        url: Some("ws://from-file".to_string()),
        reconnect_delay_ms: 700,
        frame_interval_ms: 16,
    };
    saved.save().unwrap();
    assert!(dir.path().join("config.json").exists());
    assert_eq!(ClientConfig::load().unwrap(), saved);

    // Environment wins over the file; unparsable numbers are ignored.
    guard.set("COMPANION_URL", "ws://from-env");
    guard.set("COMPANION_RECONNECT_DELAY_MS", "not-a-number");
    guard.set("COMPANION_FRAME_INTERVAL_MS", "40");
    let config = ClientConfig::load().unwrap();
    assert_eq!(config.url.as_deref(), Some("ws://from-env"));
    assert_eq!(config.reconnect_delay_ms, 700);
    assert_eq!(config.frame_interval_ms, 40);
}

#[test]
fn test_load_ignores_corrupt_file() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let guard = EnvGuard::new();
    let dir = TempDir::new().unwrap();
    guard.set("COMPANION_CONFIG_DIR", dir.path().to_str().unwrap());
    std::fs::write(dir.path().join("config.json"), "garbage").unwrap();

    assert_eq!(ClientConfig::load().unwrap(), ClientConfig::default());
}
