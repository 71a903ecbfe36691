// Teltonika RUT API request/response types
//
// Models for the RUTOS JSON API (firmware 7+). Responses wrap their
// payload in a `{ success, data }` envelope. Fields use
// `#[serde(default)]` liberally because presence varies across
// firmware versions.

use serde::{Deserialize, Serialize};

// ── Response envelope ────────────────────────────────────────────────

/// Response from `POST /api/login`.
///
/// ```json
/// { "success": true, "data": { "token": "...", "expires": 299 } }
/// ```
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<LoginData>,
}

/// Payload of a successful login.
#[derive(Debug, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
    /// Seconds until the token expires, as reported by the device.
    #[serde(default)]
    pub expires: Option<i64>,
}

/// A bearer token returned by [`GatewayClient::login`](crate::GatewayClient::login).
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    /// Expiry in seconds, if the device reported one.
    pub expires: Option<i64>,
}

// ── Send request ─────────────────────────────────────────────────────

/// Body of `POST /api/messages/actions/send`.
///
/// ```json
/// { "data": { "number": "+15551234567", "message": "hi", "modem": "1-1" } }
/// ```
#[derive(Debug, Serialize)]
pub struct SendSmsRequest<'a> {
    pub data: SendSmsData<'a>,
}

/// Inner payload of a send request. `modem` addresses the radio slot
/// on multi-modem devices.
#[derive(Debug, Serialize)]
pub struct SendSmsData<'a> {
    pub number: &'a str,
    pub message: &'a str,
    pub modem: &'a str,
}
