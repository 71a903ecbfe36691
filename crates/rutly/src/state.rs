// Shared state handed to every route handler.

use secrecy::SecretString;

use rutly_core::Dispatcher;

/// Admin credentials for the log/status views.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Shared secret for `/sms` submissions. `None` rejects everything.
    pub intake_token: Option<SecretString>,
    /// Basic-auth credentials for the views. `None` rejects everything.
    pub admin: Option<AdminCredentials>,
}
