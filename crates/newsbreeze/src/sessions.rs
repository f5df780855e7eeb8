//! Cookie-keyed browser sessions.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use cookie_store::RawCookie;
use shared::{Services, Session};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "newsbreeze_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

/// One-shot message shown on the next page render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub text: String,
}

impl Flash {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Success, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Info, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Error, text: text.into() }
    }
}

/// A browser's session plus the bits that only matter to the page
#[derive(Debug)]
pub struct UserSession {
    pub session: Session,
    pub flash: Option<Flash>,
    /// Headline the last action was about; rendered expanded
    pub focus: Option<usize>,
}

impl UserSession {
    fn new(services: &Services) -> Self {
        Self {
            session: Session::new(services),
            flash: None,
            focus: None,
        }
    }
}

pub type SharedSession = Arc<tokio::sync::Mutex<UserSession>>;

/// Sessions untouched for this long are dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
/// Most sessions held at once; the least recently seen goes first
pub const DEFAULT_MAX_SESSIONS: usize = 500;

struct Slot {
    session: SharedSession,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Slot>>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SESSIONS)
    }
}

/// The session a request belongs to
pub struct SessionHandle {
    pub id: Uuid,
    pub session: SharedSession,
    is_new: bool,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Find the session named by the request cookie, or start a new one.
    ///
    /// Idle sessions are evicted on the way in, and the least recently seen
    /// one makes room when the store is full.
    pub fn resolve(&self, headers: &HeaderMap, services: &Services) -> SessionHandle {
        // A poisoned map only means another request panicked mid-insert
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, slot| now.duration_since(slot.last_seen) < self.idle_timeout);
        if sessions.len() < before {
            tracing::debug!("Evicted {} idle sessions", before - sessions.len());
        }

        if let Some(id) = session_id(headers) {
            if let Some(slot) = sessions.get_mut(&id) {
                slot.last_seen = now;
                return SessionHandle {
                    id,
                    session: slot.session.clone(),
                    is_new: false,
                };
            }
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    tracing::debug!("Session store full, dropped {}", id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(tokio::sync::Mutex::new(UserSession::new(services)));
        sessions.insert(
            id,
            Slot {
                session: session.clone(),
                last_seen: now,
            },
        );
        tracing::debug!("Started session {} ({} active)", id, sessions.len());

        SessionHandle {
            id,
            session,
            is_new: true,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl SessionHandle {
    /// Attach the session cookie to `response` when the session is new.
    pub fn respond(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.is_new {
            if let Ok(value) = HeaderValue::from_str(&session_cookie(self.id)) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
        response
    }
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| RawCookie::parse(pair.trim()).ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn session_cookie(id: Uuid) -> String {
    RawCookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .build()
        .to_string()
}
