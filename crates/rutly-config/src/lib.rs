//! Configuration for the rutly relay server.
//!
//! Three layers, later wins: built-in defaults, `rutly.toml` in the
//! working directory, and `RUTLY_*` environment variables (nested keys
//! use `__`, e.g. `RUTLY_SERVER__PORT`). Gateway credentials may come
//! from a `[[gateways]]` TOML array or from numbered environment
//! triples (`RUTLY_GATEWAY_1_URL` / `_USERNAME` / `_PASSWORD`); the
//! numbered scan stops at the first index missing a required field,
//! and when it yields anything it replaces the TOML list.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config structs ──────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Gateway devices, in rotation order.
    #[serde(default)]
    pub gateways: Vec<GatewayConfig>,
}

/// Listening socket settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Shared secret for the submission endpoint. When unset, every
/// submission is rejected.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IntakeConfig {
    pub api_token: Option<String>,
}

/// Credentials guarding the log/status views. When unset, those views
/// are unavailable.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AdminConfig {
    pub username: Option<String>,
    /// Plaintext — prefer the environment over the TOML file.
    pub password: Option<String>,
}

/// Tuning for the dispatch engine and gateway transport.
#[derive(Debug, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Pause between consecutive sends, in milliseconds.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// Request timeout for device calls, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Skip TLS verification on device calls. RUT devices ship with
    /// self-signed certificates, so this defaults to true; it applies to
    /// gateway transport only, never to the relay's own listener.
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            send_delay_ms: default_send_delay_ms(),
            timeout_secs: default_timeout_secs(),
            insecure: default_insecure(),
        }
    }
}

/// One gateway device entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub url: String,
    pub username: String,
    /// Plaintext — prefer the environment over the TOML file.
    pub password: String,
    /// Modem slot override; the engine defaults to "1-1".
    #[serde(default)]
    pub modem: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_send_delay_ms() -> u64 {
    3000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_insecure() -> bool {
    true
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration from `rutly.toml` and the environment.
pub fn load() -> Result<Config, ConfigError> {
    load_from("rutly.toml")
}

/// Load configuration from an explicit TOML path plus the environment.
pub fn load_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path.as_ref()))
        .merge(Env::prefixed("RUTLY_").split("__"));

    let mut config: Config = figment.extract()?;

    let env_gateways = gateways_from_env();
    if !env_gateways.is_empty() {
        config.gateways = env_gateways;
    }

    Ok(config)
}

/// Scan the environment for numbered gateway triples.
///
/// Entry *k* requires `RUTLY_GATEWAY_{k}_URL`, `_USERNAME`, and
/// `_PASSWORD`; the first index missing any of them stops the scan.
/// `_MODEM` is optional.
pub fn gateways_from_env() -> Vec<GatewayConfig> {
    scan_numbered(|key| std::env::var(key).ok())
}

fn scan_numbered(get: impl Fn(&str) -> Option<String>) -> Vec<GatewayConfig> {
    let mut gateways = Vec::new();
    for k in 1usize.. {
        let url = get(&format!("RUTLY_GATEWAY_{k}_URL"));
        let username = get(&format!("RUTLY_GATEWAY_{k}_USERNAME"));
        let password = get(&format!("RUTLY_GATEWAY_{k}_PASSWORD"));

        let (Some(url), Some(username), Some(password)) = (url, username, password) else {
            break;
        };

        gateways.push(GatewayConfig {
            url,
            username,
            password,
            modem: get(&format!("RUTLY_GATEWAY_{k}_MODEM")),
        });
    }
    gateways
}

// ── Tests ───────────────────────────────────────────────────────────
