// rutly: HTTP front door for the SMS relay (intake + log views).
//
// The binary in main.rs wires configuration into these modules.

pub mod routes;
pub mod state;
