// ── Gateway registry ──
//
// Ordered, fixed list of gateway devices assembled once at startup.
// A gateway's identity is its registry position: internal indexes are
// 0-based, log entries and the status view report them 1-based.

use std::sync::RwLock;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Modem slot used when a gateway entry doesn't name one.
pub const DEFAULT_MODEM: &str = "1-1";

/// Raw gateway credentials, as read from configuration.
#[derive(Debug, Clone)]
pub struct GatewayEntry {
    pub url: String,
    pub username: String,
    pub password: SecretString,
    pub modem: Option<String>,
}

/// A single RUT device the relay can dispatch through.
///
/// Created once at startup and never destroyed while the process runs.
/// The cached token is overwritten on every successful login; nothing
/// reads it back before re-authenticating (the relay always fetches a
/// fresh token per attempt).
#[derive(Debug)]
pub struct Gateway {
    url: Url,
    username: String,
    password: SecretString,
    modem: String,
    token: RwLock<Option<String>>,
    /// Expiry in seconds as reported by the device at login. Recorded
    /// but never consulted; the engine re-authenticates on every attempt.
    token_expires: RwLock<Option<i64>>,
}

impl Gateway {
    fn from_entry(entry: GatewayEntry) -> Result<Self, CoreError> {
        let url = normalize_url(&entry.url)?;
        Ok(Self {
            url,
            username: entry.username,
            password: entry.password,
            modem: entry.modem.unwrap_or_else(|| DEFAULT_MODEM.to_string()),
            token: RwLock::new(None),
            token_expires: RwLock::new(None),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn modem(&self) -> &str {
        &self.modem
    }

    /// Store a freshly obtained token on the record. Called only after a
    /// successful login; a failed login leaves the previous token alone.
    pub fn store_token(&self, token: String, expires: Option<i64>) {
        *self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(token);
        *self
            .token_expires
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = expires;
    }

    /// The most recently stored token, if any.
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Normalize a configured URL, defaulting to `https://` when the scheme
/// is missing (self-signed TLS is the RUT factory default).
fn normalize_url(raw: &str) -> Result<Url, CoreError> {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    Url::parse(&with_scheme).map_err(|e| CoreError::InvalidGatewayUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// The ordered set of configured gateways.
#[derive(Debug)]
pub struct GatewayRegistry {
    gateways: Vec<Gateway>,
}

impl GatewayRegistry {
    /// Build the registry from configuration entries.
    ///
    /// Fails fast with [`CoreError::NoGateways`] when the list is empty —
    /// there is no valid dispatch target and the process must not start.
    pub fn from_entries(entries: Vec<GatewayEntry>) -> Result<Self, CoreError> {
        let gateways = entries
            .into_iter()
            .map(Gateway::from_entry)
            .collect::<Result<Vec<_>, _>>()?;

        if gateways.is_empty() {
            return Err(CoreError::NoGateways);
        }

        Ok(Self { gateways })
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Gateway> {
        self.gateways.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gateway> {
        self.gateways.iter()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
