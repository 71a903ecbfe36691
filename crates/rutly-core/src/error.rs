// ── Core error types ──
//
// Startup-time errors only. Dispatch-time failures never surface here:
// they are absorbed into the send log by the drain loop, because intake
// and dispatch are decoupled and the submitter has long since received
// its 202.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No usable gateway entries — the relay has no dispatch target and
    /// refuses to start.
    #[error(
        "No gateways configured — set a URL, username, and password for at least one device"
    )]
    NoGateways,

    /// A gateway URL failed to parse after scheme normalization.
    #[error("Invalid gateway URL '{url}': {reason}")]
    InvalidGatewayUrl { url: String, reason: String },
}
