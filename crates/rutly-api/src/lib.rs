// rutly-api: Async Rust client for the Teltonika RUT gateway HTTP API (login + SMS send)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::GatewayClient;
pub use error::Error;
pub use models::AuthToken;
pub use transport::{TlsMode, TransportConfig};
