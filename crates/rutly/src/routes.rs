// HTTP front door: intake, log view, log clear, status, health.
//
// Thin glue only. Submission is asynchronous acceptance — the caller
// gets a 202 the moment the message is queued and never hears about
// dispatch outcomes; those land in the log view.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::TypedHeader;
use axum_extra::headers::authorization::{Basic, Bearer};
use axum_extra::headers::Authorization;
use axum_extra::typed_header::TypedHeaderRejection;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Build the relay router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sms", post(submit_sms))
        .route("/log", get(log_view))
        .route("/log/clear", post(clear_log))
        .route("/status", get(status_view))
        .with_state(state)
}

// ── Intake ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SmsRequest {
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// Intake token may ride in the body instead of the header.
    #[serde(default)]
    token: Option<String>,
}

async fn submit_sms(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    Json(request): Json<SmsRequest>,
) -> Response {
    // A malformed Authorization header is treated like an absent one;
    // the body token may still authorize the request.
    let bearer = bearer.ok();
    if !intake_token_ok(&state, bearer.as_ref(), request.token.as_deref()) {
        debug!("intake rejected: invalid token");
        return (StatusCode::FORBIDDEN, "Forbidden: invalid token").into_response();
    }

    // Presence checks only — content validation is out of scope.
    let to = request.to.filter(|s| !s.is_empty());
    let message = request.message.filter(|s| !s.is_empty());
    let (Some(to), Some(message)) = (to, message) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing \"to\" or \"message\" in request body",
        )
            .into_response();
    };

    state.dispatcher.enqueue(to, message);
    info!(queue_len = state.dispatcher.queue_len(), "SMS queued");
    state.dispatcher.drain_if_idle();

    (StatusCode::ACCEPTED, "SMS queued successfully").into_response()
}

fn intake_token_ok(
    state: &AppState,
    bearer: Option<&TypedHeader<Authorization<Bearer>>>,
    body_token: Option<&str>,
) -> bool {
    let Some(expected) = state.intake_token.as_ref() else {
        warn!("intake token not configured; rejecting submission");
        return false;
    };
    let expected = expected.expose_secret();

    if let Some(TypedHeader(auth)) = bearer {
        if auth.token() == expected {
            return true;
        }
    }
    body_token == Some(expected)
}

// ── Presentation ────────────────────────────────────────────────────

async fn log_view(
    State(state): State<AppState>,
    basic: Result<TypedHeader<Authorization<Basic>>, TypedHeaderRejection>,
) -> Response {
    if let Err(denied) = admin_ok(&state, basic.ok().as_ref()) {
        return denied;
    }
    Json(state.dispatcher.snapshot_log()).into_response()
}

async fn clear_log(
    State(state): State<AppState>,
    basic: Result<TypedHeader<Authorization<Basic>>, TypedHeaderRejection>,
) -> Response {
    if let Err(denied) = admin_ok(&state, basic.ok().as_ref()) {
        return denied;
    }
    state.dispatcher.clear_log();
    StatusCode::NO_CONTENT.into_response()
}

async fn status_view(
    State(state): State<AppState>,
    basic: Result<TypedHeader<Authorization<Basic>>, TypedHeaderRejection>,
) -> Response {
    if let Err(denied) = admin_ok(&state, basic.ok().as_ref()) {
        return denied;
    }
    Json(json!({
        "queue_len": state.dispatcher.queue_len(),
        "draining": state.dispatcher.is_draining(),
        "gateways": state.dispatcher.gateway_count(),
    }))
    .into_response()
}

fn admin_ok(
    state: &AppState,
    basic: Option<&TypedHeader<Authorization<Basic>>>,
) -> Result<(), Response> {
    let granted = match (&state.admin, basic) {
        (Some(admin), Some(TypedHeader(auth))) => {
            auth.username() == admin.username
                && auth.password() == admin.password.expose_secret()
        }
        _ => false,
    };

    if granted {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            [("www-authenticate", "Basic realm=\"rutly\"")],
            "Unauthorized",
        )
            .into_response())
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
