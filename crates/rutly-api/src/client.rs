// Gateway HTTP client
//
// Wraps `reqwest::Client` with the two RUT device calls the relay
// needs: token login and SMS send. Purely transport — no retries,
// no queue knowledge. The dispatch engine classifies outcomes.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{AuthToken, LoginResponse, SendSmsData, SendSmsRequest};
use crate::transport::TransportConfig;

/// Async client for the Teltonika RUT device API.
///
/// One instance is shared across all configured gateways; per-device
/// state (URL, credentials, cached token) lives on the gateway record,
/// not here.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
}

impl GatewayClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Create a client from a pre-built `reqwest::Client` (used by tests).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Obtain a fresh bearer token from the device.
    ///
    /// `POST {base_url}/api/login` with the stored credentials. Success
    /// means the body is `{ success: true, data: { token } }`; any other
    /// response shape is an [`Error::Authentication`].
    pub async fn login(
        &self,
        base_url: &Url,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthToken, Error> {
        let url = base_url.join("/api/login")?;

        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self.http.post(url.clone()).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                url: url.to_string(),
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let body = resp.text().await?;
        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|_| Error::Authentication {
                url: url.to_string(),
                message: format!("unrecognized login response: {body}"),
            })?;

        let token = match parsed {
            LoginResponse {
                success: true,
                data: Some(data),
            } => data.token.map(|token| AuthToken {
                token,
                expires: data.expires,
            }),
            _ => None,
        };

        token.ok_or_else(|| Error::Authentication {
            url: url.to_string(),
            message: format!("login response carried no token: {body}"),
        })
    }

    /// Submit one SMS through the device.
    ///
    /// `POST {base_url}/api/messages/actions/send` with the bearer token.
    /// Returns the provider-specific response body on success; a
    /// non-success status becomes [`Error::SendRejected`].
    pub async fn send_sms(
        &self,
        base_url: &Url,
        token: &str,
        number: &str,
        message: &str,
        modem: &str,
    ) -> Result<serde_json::Value, Error> {
        let url = base_url.join("/api/messages/actions/send")?;

        let request = SendSmsRequest {
            data: SendSmsData {
                number,
                message,
                modem,
            },
        };

        debug!(%url, number, "sending SMS");

        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::SendRejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload = resp.json().await?;
        Ok(payload)
    }
}
