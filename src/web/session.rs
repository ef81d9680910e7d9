//! Cookie sessions kept in server memory.
//!
//! The browser only holds an opaque id in the `s` cookie; the OAuth state and
//! the logged-in user (including the access token) stay on the server.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

use crate::checklist::GitHubUser;

pub const SESSION_COOKIE: &str = "s";

/// Logged-in sessions idle for longer than this are dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Sessions without a user (an OAuth round trip in progress) expire sooner.
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// Minimum time between sweeps of expired sessions.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Pending OAuth `state`, set by `/auth` and consumed by the callback.
    pub oauth_state: Option<String>,
    pub user: Option<GitHubUser>,
}

#[derive(Debug)]
struct Entry {
    session: Session,
    touched: Instant,
}

#[derive(Debug)]
struct Sessions {
    entries: HashMap<String, Entry>,
    last_prune: Instant,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    pending_ttl: Duration,
    prune_interval: Duration,
    sessions: RwLock<Sessions>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending_ttl: PENDING_LOGIN_TTL.min(ttl),
            prune_interval: PRUNE_INTERVAL,
            sessions: RwLock::new(Sessions {
                entries: HashMap::new(),
                last_prune: Instant::now(),
            }),
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl.min(self.ttl);
        self
    }

    fn ttl_for(&self, session: &Session) -> Duration {
        if session.user.is_some() {
            self.ttl
        } else {
            self.pending_ttl
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.touched.elapsed() > self.ttl_for(&entry.session)
    }

    /// Live session for `id`, if any. Reading refreshes its idle timer.
    pub fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.entries.get(id)?;
        if self.is_expired(entry) {
            sessions.entries.remove(id);
            return None;
        }
        let entry = sessions.entries.get_mut(id)?;
        entry.touched = Instant::now();
        Some(entry.session.clone())
    }

    /// Store `session` under a fresh id and return the id.
    pub fn create(&self, session: Session) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.save(&id, session);
        id
    }

    /// Insert or replace `id`. Expired sessions are swept at most once per
    /// prune interval.
    pub fn save(&self, id: &str, session: Session) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.last_prune.elapsed() >= self.prune_interval {
            sessions.entries.retain(|_, entry| !self.is_expired(entry));
            sessions.last_prune = Instant::now();
        }
        sessions.entries.insert(
            id.to_string(),
            Entry {
                session,
                touched: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session id from the request's `Cookie` headers.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

pub fn expired_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::default();
        let id = store.create(Session {
            oauth_state: Some("xyz".to_string()),
            user: None,
        });
        let session = store.get(&id).unwrap();
        assert_eq!(session.oauth_state.as_deref(), Some("xyz"));
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn test_save_replaces_and_remove_deletes() {
        let store = SessionStore::default();
        let id = store.create(Session::default());
        store.save(
            &id,
            Session {
                oauth_state: None,
                user: Some(crate::checklist::tests::user(1, "alice")),
            },
        );
        assert_eq!(store.get(&id).unwrap().user.unwrap().login, "alice");

        store.remove(&id);
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create(Session::default());
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_pending_login_expires_before_logged_in_session() {
        let store = SessionStore::new(Duration::from_secs(3600)).with_pending_ttl(Duration::ZERO);
        let pending = store.create(Session {
            oauth_state: Some("xyz".to_string()),
            user: None,
        });
        let logged_in = store.create(Session {
            oauth_state: None,
            user: Some(crate::checklist::tests::user(1, "alice")),
        });
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get(&pending).is_none());
        assert_eq!(store.get(&logged_in).unwrap().user.unwrap().login, "alice");
    }

    #[test]
    fn test_default_pending_ttl_is_short() {
        let store = SessionStore::default();
        assert_eq!(store.ttl_for(&Session::default()), PENDING_LOGIN_TTL);
        assert!(PENDING_LOGIN_TTL < DEFAULT_SESSION_TTL);
        assert_eq!(SessionStore::new(Duration::ZERO).pending_ttl, Duration::ZERO);
    }

    #[test]
    fn test_save_sweeps_only_after_prune_interval() {
        let store = SessionStore::new(Duration::ZERO);
        for _ in 0..3 {
            store.create(Session::default());
        }
        std::thread::sleep(Duration::from_millis(5));
        store.create(Session::default());
        assert_eq!(store.len(), 4);

        let mut store = SessionStore::new(Duration::ZERO);
        store.prune_interval = Duration::ZERO;
        for _ in 0..3 {
            store.create(Session::default());
        }
        std::thread::sleep(Duration::from_millis(5));
        store.create(Session::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; s=abc123; other=1"));
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_session_id_across_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("s=def456"));
        assert_eq!(session_id(&headers).as_deref(), Some("def456"));
    }

    #[test]
    fn test_session_id_missing_or_empty() {
        assert!(session_id(&HeaderMap::new()).is_none());
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("s=; ss=nope"));
        assert!(session_id(&headers).is_none());
    }

    #[test]
    fn test_cookie_strings() {
        assert_eq!(session_cookie("abc"), "s=abc; Path=/; HttpOnly; SameSite=Lax");
        assert!(expired_cookie().contains("Max-Age=0"));
    }
}
