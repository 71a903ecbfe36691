use std::net::SocketAddr;
use std::time::Duration;

use miette::IntoDiagnostic;
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rutly_api::{GatewayClient, TlsMode, TransportConfig};
use rutly_config::Config;
use rutly_core::{Dispatcher, GatewayEntry, GatewayRegistry};

use rutly::routes;
use rutly::state::{AdminCredentials, AppState};

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();

    let config = rutly_config::load().into_diagnostic()?;

    let dispatcher = build_dispatcher(&config)?;
    info!(
        gateways = dispatcher.gateway_count(),
        "gateway registry ready"
    );

    // Kick the drain loop for anything already pending at startup.
    if dispatcher.queue_len() > 0 {
        dispatcher.drain_if_idle();
    }

    let state = AppState {
        dispatcher,
        intake_token: intake_token(&config),
        admin: admin_credentials(&config),
    };

    let app = routes::build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .into_diagnostic()?;
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;

    info!(%addr, "rutly relay listening");
    axum::serve(listener, app).await.into_diagnostic()?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

/// Wire the registry, transport, and engine together from configuration.
///
/// An empty gateway list is fatal — the process refuses to start with
/// no dispatch target.
fn build_dispatcher(config: &Config) -> miette::Result<Dispatcher> {
    let entries: Vec<GatewayEntry> = config
        .gateways
        .iter()
        .map(|gw| GatewayEntry {
            url: gw.url.clone(),
            username: gw.username.clone(),
            password: SecretString::from(gw.password.clone()),
            modem: gw.modem.clone(),
        })
        .collect();

    let registry = GatewayRegistry::from_entries(entries).into_diagnostic()?;

    let transport = TransportConfig {
        tls: if config.dispatch.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        },
        timeout: Duration::from_secs(config.dispatch.timeout_secs),
    };
    let client = GatewayClient::new(&transport).into_diagnostic()?;

    Ok(Dispatcher::new(
        registry,
        client,
        Duration::from_millis(config.dispatch.send_delay_ms),
    ))
}

fn intake_token(config: &Config) -> Option<SecretString> {
    let token = config.intake.api_token.clone().map(SecretString::from);
    if token.is_none() {
        warn!("intake api_token not configured; /sms submissions will be rejected");
    }
    token
}

fn admin_credentials(config: &Config) -> Option<AdminCredentials> {
    match (&config.admin.username, &config.admin.password) {
        (Some(username), Some(password)) => Some(AdminCredentials {
            username: username.clone(),
            password: SecretString::from(password.clone()),
        }),
        _ => {
            warn!("admin credentials not configured; log and status views are unavailable");
            None
        }
    }
}
