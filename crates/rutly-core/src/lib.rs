//! rutly-core: the queue dispatch engine of the SMS relay.
//!
//! Owns the pending queue, the send log, and the single drain loop that
//! pulls messages off the queue, authenticates against a gateway, submits
//! the message, and applies the retry policy. The HTTP front door and the
//! log view talk to the [`Dispatcher`] only through its public operations;
//! all queue/log/rotation mutation happens behind it.

pub mod dispatcher;
pub mod error;
pub mod log;
pub mod registry;

pub use dispatcher::{Dispatcher, QueuedSms, DEFAULT_SEND_DELAY, RETRY_CEILING};
pub use error::CoreError;
pub use log::{LogEntry, SendLog, SendStatus};
pub use registry::{Gateway, GatewayEntry, GatewayRegistry, DEFAULT_MODEM};
