//! HTTP control interface.
//!
//! Three endpoints over the session: `/ready` for probes, `/qr` for the
//! pairing code, `/send` for outbound text. Handlers are stateless; each
//! request takes a state snapshot or calls the send operation and never holds
//! the state lock across an external call.

use crate::auth::timing_safe_eq;
use crate::jid::Jid;
use crate::qr;
use crate::session::{SendError, SessionHandle};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub server_key: Arc<str>,
}

impl AppState {
    pub fn new(session: SessionHandle, server_key: impl Into<Arc<str>>) -> Self {
        Self {
            session,
            server_key: server_key.into(),
        }
    }

    fn key_matches(&self, provided: &str) -> bool {
        timing_safe_eq(provided, &self.server_key)
    }
}

/// Build the router. Shared between production startup and tests.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/qr", get(qr_code))
        .route("/send", post(send))
        .with_state(state)
}

/// Serve `app` until the token is cancelled, then finish in-flight requests.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Deliberately generic: auth failures never reveal a reason.
fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "403 Forbidden").into_response()
}

async fn ready(State(state): State<AppState>) -> Response {
    if state.session.snapshot().ready {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct QrQuery {
    #[serde(default)]
    key: String,
}

async fn qr_code(State(state): State<AppState>, Query(query): Query<QrQuery>) -> Response {
    if !state.key_matches(&query.key) {
        return forbidden();
    }
    let snapshot = state.session.snapshot();
    if snapshot.ready {
        return (StatusCode::BAD_REQUEST, "already logged in").into_response();
    }
    let Some(code) = snapshot.pending_code else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no QR code available").into_response();
    };
    match qr::render_png(&code) {
        Ok(png) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            png,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to render pairing code");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendForm {
    #[serde(default)]
    key: String,
    to: Option<String>,
    text: Option<String>,
}

async fn send(State(state): State<AppState>, Form(form): Form<SendForm>) -> Response {
    // Readiness is checked before anything else, auth included.
    if !state.session.snapshot().ready {
        return (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response();
    }
    if !state.key_matches(&form.key) {
        return forbidden();
    }
    let Some(to) = form.to.filter(|to| !to.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "to is required").into_response();
    };
    let to: Jid = match to.parse() {
        Ok(jid) => jid,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    let Some(text) = form.text.filter(|text| !text.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "text is required").into_response();
    };
    match state.session.send_text(&to, &text).await {
        Ok(id) => {
            tracing::debug!(to = %to, message_id = %id, "message sent");
            (StatusCode::OK, "OK").into_response()
        }
        Err(err @ SendError::NotReady) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::warn!(to = %to, error = %err, "send failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
