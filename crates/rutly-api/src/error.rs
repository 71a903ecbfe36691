use thiserror::Error;

/// Top-level error type for the `rutly-api` crate.
///
/// Covers every failure mode of the two device calls: authentication,
/// send rejection, and transport. `rutly-core` treats all of them the
/// same way for retry purposes; the distinction only matters for the
/// error detail recorded in the send log.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected or the response carried no token.
    #[error("Authentication failed for {url}: {message}")]
    Authentication { url: String, message: String },

    // ── Send ────────────────────────────────────────────────────────
    /// The device answered the send call with a non-success status.
    #[error("Send rejected (HTTP {status}): {body}")]
    SendRejected { status: u16, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),
}
