//! Web front end for the panel.
//!
//! Every route goes through [`session_layer`], which looks up the browser
//! session and runs the command gate's pre-request hook before the handler.
//! Sessions are only created by handlers that store something in them.
//! Pin actions and gate triggers always answer with a redirect back to `/`;
//! hardware and notifier failures are logged, never turned into error pages.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use pinconf::{AuthConfig, PanelSettings};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchOutcome, Dispatcher, Intent};
use crate::gate::{CommandGate, CommandKind};
use crate::panel::{render_login, render_panel, PanelView};
use crate::reconcile::Reconciler;
use crate::registry::{PinId, PinRegistry};
use crate::session::{session_cookie, session_id_from_headers, SessionStore};

/// Shared state for web handlers
#[derive(Clone)]
pub struct PanelState {
    pub registry: Arc<PinRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<Reconciler>,
    pub gate: Arc<CommandGate>,
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<AuthConfig>,
    pub settings: Arc<PanelSettings>,
    /// Formatted board temperature, read once at startup.
    pub temperature: Arc<str>,
    pub backend: &'static str,
    pub start_time: Instant,
}

impl PanelState {
    fn authorized(&self, session: &SessionId) -> bool {
        !self.auth.enabled() || self.is_logged_in(session)
    }

    fn is_logged_in(&self, session: &SessionId) -> bool {
        session
            .id()
            .is_some_and(|id| self.sessions.is_authenticated(id))
    }

    /// The request's session, creating one if the browser has none yet.
    /// The flag is `true` when the response must set the cookie.
    fn ensure_session(&self, session: &SessionId) -> (String, bool) {
        match session.id() {
            Some(id) => (id.to_string(), false),
            None => (self.sessions.create(), true),
        }
    }
}

/// Known session for the request, as found by [`session_layer`].
#[derive(Debug, Clone, Default)]
pub struct SessionId(pub Option<String>);

impl SessionId {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn router(state: PanelState) -> Router {
    Router::new()
        .route("/", get(control_panel))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout))
        .route("/shutdown", post(shutdown))
        .route("/restart", post(restart))
        .route("/VNC", get(vnc_redirect))
        .route("/health", get(health))
        .route("/api/pins", get(api_pins))
        .route("/{pin}/{status}", get(send_action))
        .layer(middleware::from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Look up the session and clear gate flags before any handler runs.
pub async fn session_layer(State(state): State<PanelState>, mut req: Request, next: Next) -> Response {
    let cookie_id = session_id_from_headers(req.headers());
    let id = state.sessions.lookup(cookie_id.as_deref());

    if let Some(ref id) = id {
        let incoming = CommandKind::for_request(req.method(), req.uri().path());
        state.sessions.begin_request(id, incoming);
    }

    req.extensions_mut().insert(SessionId(id));
    next.run(req).await
}

fn set_session_cookie(mut response: Response, id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(&session_cookie(id)) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn to_login() -> Response {
    Redirect::to("/login").into_response()
}

fn to_panel() -> Response {
    Redirect::to("/").into_response()
}

/// Render the panel with freshly reconciled pin levels.
async fn control_panel(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    if !state.authorized(&session) {
        return to_login();
    }

    let snapshot = state.reconciler.snapshot().await;
    Html(render_panel(&PanelView {
        title: &state.settings.title,
        temperature: &state.temperature,
        snapshot: &snapshot,
        show_logout: state.auth.enabled(),
    }))
    .into_response()
}

/// `GET /{pin}/{status}`: toggle a pin and bounce back to the panel.
async fn send_action(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
    Path((pin, status)): Path<(String, String)>,
) -> Response {
    if !state.authorized(&session) {
        return to_login();
    }

    let (Ok(pin), Ok(intent)) = (pin.parse::<u32>(), status.parse::<Intent>()) else {
        debug!(pin = %pin, status = %status, "Ignoring malformed pin action");
        return to_panel();
    };

    let outcome = state.dispatcher.dispatch(PinId(pin), intent);
    if let DispatchOutcome::Accepted(ticket) = outcome {
        if state.settings.await_writes {
            if let Err(e) = ticket.settle().await {
                warn!(error = %e, "Pin write failed before redirect");
            }
        }
    }

    // Usually runs before the write lands; the render after the redirect catches up.
    state.reconciler.snapshot().await;

    to_panel()
}

async fn shutdown(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    trigger_command(&state, &session, CommandKind::Shutdown)
}

async fn restart(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    trigger_command(&state, &session, CommandKind::Restart)
}

fn trigger_command(state: &PanelState, session: &SessionId, kind: CommandKind) -> Response {
    if !state.authorized(session) {
        return to_login();
    }

    let (id, created) = state.ensure_session(session);
    if let Some(mut entry) = state.sessions.get_mut(&id) {
        let outcome = state.gate.trigger(&mut entry.gate, kind);
        info!(
            session_id = %id,
            command = %kind,
            executed = outcome.executed(),
            "Command gate triggered"
        );
    }

    if created {
        set_session_cookie(to_panel(), &id)
    } else {
        to_panel()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

async fn login_page(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    if state.auth.enabled() && state.is_logged_in(&session) {
        return to_panel();
    }
    Html(render_login(&state.settings.title, false)).into_response()
}

async fn login_submit(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
    Form(form): Form<LoginForm>,
) -> Response {
    if credentials_match(&state.auth, &form.username, &form.password) {
        let (id, created) = state.ensure_session(&session);
        state.sessions.login(&id, &form.username);
        if created {
            set_session_cookie(to_panel(), &id)
        } else {
            to_panel()
        }
    } else {
        warn!(session_id = ?session.id(), user = %form.username, "Rejected login");
        (
            StatusCode::UNAUTHORIZED,
            Html(render_login(&state.settings.title, true)),
        )
            .into_response()
    }
}

/// Compare both fields in constant time. Without a password every login succeeds.
fn credentials_match(auth: &AuthConfig, username: &str, password: &str) -> bool {
    match auth.password.as_deref() {
        Some(expected) if auth.enabled() => {
            let user_ok = username.as_bytes().ct_eq(auth.username.as_bytes());
            let pass_ok = password.as_bytes().ct_eq(expected.as_bytes());
            bool::from(user_ok & pass_ok)
        }
        _ => true,
    }
}

async fn logout(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    if let Some(id) = session.id() {
        state.sessions.logout(id);
    }
    to_login()
}

/// Send the browser to the remote-desktop service on the same host.
async fn vnc_redirect(State(state): State<PanelState>, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(strip_port)
        .unwrap_or("localhost");
    Redirect::to(&format!("http://{}:{}/", host, state.settings.vnc_port)).into_response()
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 keeps its brackets
    if let Some(end) = host.find(']') {
        return &host[..=end];
    }
    host.split(':').next().unwrap_or(host)
}

async fn health(State(state): State<PanelState>) -> Json<serde_json::Value> {
    let sessions = state.sessions.stats();
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "gpio_backend": state.backend,
        "pins": state.registry.len(),
        "sessions": sessions.total,
    }))
}

/// JSON view of the reconciled pins.
async fn api_pins(
    State(state): State<PanelState>,
    Extension(session): Extension<SessionId>,
) -> Response {
    if !state.authorized(&session) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let snapshot = state.reconciler.snapshot().await;
    let stale: Vec<PinId> = snapshot.stale.iter().map(|(id, _)| *id).collect();
    Json(serde_json::json!({
        "temperature": &*state.temperature,
        "pins": snapshot.pins,
        "stale": stale,
    }))
    .into_response()
}
