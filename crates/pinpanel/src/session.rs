//! Browser sessions.
//!
//! In-memory store keyed by a random cookie value. A session carries the login
//! state and the command gate flags; nothing here survives a restart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use uuid::Uuid;

use crate::gate::{CommandKind, GateFlags};

pub const SESSION_COOKIE: &str = "pinpanel_session";

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    pub last_seen: Instant,
    /// Username after a successful login.
    pub user: Option<String>,
    pub gate: GateFlags,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_seen: now,
            user: None,
            gate: GateFlags::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn idle_duration(&self) -> Duration {
        self.last_seen.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

/// A mutable reference to a session (from DashMap).
pub type SessionRefMut<'a> = dashmap::mapref::one::RefMut<'a, String, Session>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total: usize,
    pub authenticated: usize,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Find the session named by the cookie and mark it active.
    ///
    /// Never creates anything; unknown ids are not adopted.
    pub fn lookup(&self, cookie_id: Option<&str>) -> Option<String> {
        let id = cookie_id?;
        let mut session = self.sessions.get_mut(id)?;
        session.touch();
        Some(id.to_string())
    }

    /// Start a session with a server-generated id.
    ///
    /// Only called by handlers that store something in the session, so
    /// cookieless traffic such as health probes never grows the store.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), Session::new(id.clone()));
        tracing::debug!(session_id = %id, "Created session");
        id
    }

    pub fn get_mut(&self, id: &str) -> Option<SessionRefMut<'_>> {
        self.sessions.get_mut(id)
    }

    /// Pre-request hook: clear gate flags not belonging to this request.
    pub fn begin_request(&self, id: &str, incoming: Option<CommandKind>) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.gate.on_request(incoming);
        }
    }

    pub fn is_authenticated(&self, id: &str) -> bool {
        self.sessions
            .get(id)
            .map(|s| s.is_authenticated())
            .unwrap_or(false)
    }

    pub fn login(&self, id: &str, user: &str) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.user = Some(user.to_string());
            session.touch();
            tracing::info!(session_id = %id, user = %user, "Logged in");
        }
    }

    pub fn logout(&self, id: &str) {
        if let Some((_, session)) = self.sessions.remove(id) {
            tracing::info!(session_id = %id, user = ?session.user, "Logged out");
        }
    }

    /// Remove sessions idle longer than `max_idle`. Returns how many went.
    pub fn cleanup(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.idle_duration() <= max_idle);
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            tracing::info!(
                removed = removed,
                remaining = self.sessions.len(),
                "Session cleanup completed"
            );
        }

        removed
    }

    pub fn stats(&self) -> SessionStats {
        let authenticated = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_authenticated())
            .count();
        SessionStats {
            total: self.sessions.len(),
            authenticated,
        }
    }
}

/// Spawn a background task that periodically drops idle sessions.
pub fn spawn_cleanup_task(
    store: Arc<SessionStore>,
    interval: Duration,
    max_idle: Duration,
    cancel: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Session cleanup task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    store.cleanup(max_idle);
                }
            }
        }
    })
}

/// Session id from the request's `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_create_and_lookup() {
        let store = SessionStore::new();
        let id = store.create();

        assert_eq!(store.lookup(Some(&id)), Some(id.clone()));
        assert_eq!(store.stats().total, 1);
    }

    #[test]
    fn test_lookup_never_creates() {
        let store = SessionStore::new();
        assert_eq!(store.lookup(None), None);
        assert_eq!(store.lookup(Some("attacker-chosen")), None);
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_login_logout() {
        let store = SessionStore::new();
        let id = store.create();
        assert!(!store.is_authenticated(&id));

        store.login(&id, "admin");
        assert!(store.is_authenticated(&id));
        assert_eq!(store.stats().authenticated, 1);

        store.logout(&id);
        assert!(!store.is_authenticated(&id));
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_begin_request_clears_gate() {
        let store = SessionStore::new();
        let id = store.create();
        {
            let mut session = store.get_mut(&id).unwrap();
            session.gate.set(CommandKind::Shutdown, true);
        }
        store.begin_request(&id, None);
        assert!(!store.get_mut(&id).unwrap().gate.is_armed(CommandKind::Shutdown));
    }

    #[test]
    fn test_cleanup() {
        let store = SessionStore::new();
        store.create();
        assert_eq!(store.cleanup(Duration::from_secs(3600)), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup(Duration::ZERO), 1);
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; pinpanel_session=abc-123; other=1"),
        );
        assert_eq!(session_id_from_headers(&headers).as_deref(), Some("abc-123"));

        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("xyz");
        assert!(cookie.starts_with("pinpanel_session=xyz;"));
        assert!(cookie.contains("HttpOnly"));
    }
}
