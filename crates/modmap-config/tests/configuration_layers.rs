//! Layered loading of the daemon configuration.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use modmap_config::{Config, LogFormat, SocketEndpoint, default_socket_endpoint};
use once_cell::sync::Lazy;
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serialises environment access and restores overridden variables on drop.
struct EnvGuard {
    previous: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    fn new() -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            previous: Vec::new(),
            _lock: lock,
        }
    }

    fn set(&mut self, key: &'static str, value: impl AsRef<OsStr>) {
        self.previous.push((key, std::env::var_os(key)));
        // Environment mutation is `unsafe` in edition 2024; the mutex keeps
        // these tests from racing each other.
        unsafe { std::env::set_var(key, value) };
    }

    fn clear(&mut self, key: &'static str) {
        self.previous.push((key, std::env::var_os(key)));
        unsafe { std::env::remove_var(key) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        while let Some((key, value)) = self.previous.pop() {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

const MODMAP_VARS: [&str; 6] = [
    "MODMAP_DAEMON_SOCKET",
    "MODMAP_REPO_DIR",
    "MODMAP_CMI_SUFFIX",
    "MODMAP_LOG_FILTER",
    "MODMAP_TELEMETRY_FORMAT",
    "MODMAP_CONFIG_PATH",
];

fn clean_env() -> EnvGuard {
    let mut guard = EnvGuard::new();
    for key in MODMAP_VARS {
        guard.clear(key);
    }
    guard
}

#[test]
fn loads_defaults_without_overrides() {
    let _env = clean_env();
    let config = Config::load_from_iter(["modmapd"]).expect("defaults load");
    assert_eq!(config.daemon_socket(), &default_socket_endpoint());
    assert_eq!(config.repo_dir(), Utf8Path::new("cmi.cache"));
    assert_eq!(config.cmi_suffix(), "cmi");
    assert_eq!(config.log_format(), LogFormat::Json);
}

#[test]
fn environment_overrides_repository_settings() {
    let mut env = clean_env();
    env.set("MODMAP_REPO_DIR", "/var/cache/cmi");
    env.set("MODMAP_CMI_SUFFIX", "gcm");
    let config = Config::load_from_iter(["modmapd"]).expect("env load");
    assert_eq!(config.repo_dir(), Utf8Path::new("/var/cache/cmi"));
    assert_eq!(config.cmi_suffix(), "gcm");
}

#[test]
fn cli_overrides_environment() {
    let mut env = clean_env();
    env.set("MODMAP_CMI_SUFFIX", "gcm");
    let config = Config::load_from_iter(["modmapd", "--cmi-suffix", "pcm"]).expect("cli load");
    assert_eq!(config.cmi_suffix(), "pcm");
}

#[test]
fn configuration_file_accepts_endpoint_tables() {
    let _env = clean_env();
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("modmap.toml");
    fs::write(
        &path,
        "daemon_socket = { transport = \"unix\", path = \"/tmp/modmap-test.sock\" }\n\
         telemetry_format = \"compact\"\n",
    )
    .expect("write config");

    let args = vec![
        OsString::from("modmapd"),
        OsString::from("--config-path"),
        path.into_os_string(),
    ];
    let config = Config::load_from_iter(args).expect("file load");
    assert_eq!(
        config.daemon_socket(),
        &SocketEndpoint::unix("/tmp/modmap-test.sock")
    );
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[test]
fn environment_accepts_endpoint_text() {
    let mut env = clean_env();
    env.set("MODMAP_DAEMON_SOCKET", "stdio");
    let config = Config::load_from_iter(["modmapd"]).expect("env load");
    assert_eq!(config.daemon_socket(), &SocketEndpoint::Stdio);
}
