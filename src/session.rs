use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Local};
use headers::Cookie;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::Settings,
    error::AppError,
    models::{FilterSelection, RecentSearchEntry},
};

pub const SESSION_COOKIE: &str = "pricing_session";

// --- Per-session dashboard state ---

/// Where a session sits relative to its filters. There is no terminal state;
/// a session that stops being used is evicted from the store with its history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initial,
    FiltersDefault,
    FiltersActive,
}

#[derive(Debug)]
pub struct DashboardSession {
    state: SessionState,
    last_selection: Option<FilterSelection>,
    recent: VecDeque<RecentSearchEntry>,
    limit: usize,
}

impl DashboardSession {
    pub fn new(limit: usize) -> Self {
        Self {
            state: SessionState::Initial,
            last_selection: None,
            recent: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Most recent first.
    pub fn recent_searches(&self) -> Vec<RecentSearchEntry> {
        self.recent.iter().cloned().collect()
    }

    /// Applies the controls' current values. A selection that differs from the
    /// previous one is a change event; a change to anything but all-"All" is
    /// recorded at the front of the history. Returns whether an entry was added.
    pub fn apply_selection(&mut self, selection: &FilterSelection, now: DateTime<Local>) -> bool {
        let changed = match &self.last_selection {
            // Controls start out on "All"
            None => !selection.is_default(),
            Some(previous) => previous != selection,
        };

        self.state = if selection.is_default() {
            SessionState::FiltersDefault
        } else {
            SessionState::FiltersActive
        };
        self.last_selection = Some(selection.clone());

        if !changed || selection.is_default() || self.limit == 0 {
            return false;
        }

        self.recent.push_front(RecentSearchEntry::new(selection, now));
        self.recent.truncate(self.limit);
        true
    }
}

// --- Session registry ---

struct SessionSlot {
    session: Arc<Mutex<DashboardSession>>,
    last_seen: Instant,
}

/// All live sessions. A session idle for longer than `idle_timeout` is gone,
/// and the least recently seen one makes room once `max_sessions` is reached.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    recent_limit: usize,
    idle_timeout: Duration,
    max_sessions: usize,
}

#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub is_new: bool,
    pub session: Arc<Mutex<DashboardSession>>,
}

impl SessionHandle {
    /// `Set-Cookie` value to send when the session was created by this request.
    pub fn set_cookie(&self) -> Option<String> {
        self.is_new
            .then(|| format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id))
    }
}

impl SessionStore {
    pub fn new(recent_limit: usize, idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            recent_limit,
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.recent_search_limit,
            Duration::from_secs(settings.session_idle_timeout_secs),
            settings.max_sessions,
        )
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Looks up the session for `id`, creating a fresh one when the id is
    /// missing, unknown (e.g. after a restart) or expired.
    pub async fn get_or_create(&self, id: Option<&str>) -> SessionHandle {
        self.get_or_create_at(id, Instant::now()).await
    }

    async fn get_or_create_at(&self, id: Option<&str>, now: Instant) -> SessionHandle {
        let mut sessions = self.sessions.write().await;

        if let Some(id) = id {
            match sessions.get_mut(id) {
                Some(slot) if !self.is_idle(slot, now) => {
                    slot.last_seen = now;
                    return SessionHandle {
                        id: id.to_string(),
                        is_new: false,
                        session: slot.session.clone(),
                    };
                }
                Some(_) => debug!("Session expired, starting a new session"),
                None => debug!("Unknown session id, starting a new session"),
            }
        }

        self.evict(&mut sessions, now);

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Mutex::new(DashboardSession::new(self.recent_limit)));
        sessions.insert(
            id.clone(),
            SessionSlot {
                session: session.clone(),
                last_seen: now,
            },
        );
        info!("Started dashboard session ({} active)", sessions.len());

        SessionHandle {
            id,
            is_new: true,
            session,
        }
    }

    fn is_idle(&self, slot: &SessionSlot, now: Instant) -> bool {
        now.saturating_duration_since(slot.last_seen) > self.idle_timeout
    }

    // Makes room for one more session
    fn evict(&self, sessions: &mut HashMap<String, SessionSlot>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, slot| !self.is_idle(slot, now));

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => sessions.remove(&id),
                None => break,
            };
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Evicted dashboard sessions");
        }
    }
}

// --- Extractor ---

#[async_trait]
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
    Arc<SessionStore>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A missing or malformed Cookie header just means "no session yet"
        let cookies = parts
            .extract::<Option<TypedHeader<Cookie>>>()
            .await
            .unwrap_or(None);
        let session_id = cookies
            .as_ref()
            .and_then(|TypedHeader(cookie)| cookie.get(SESSION_COOKIE));

        let store = Arc::<SessionStore>::from_ref(state);
        Ok(store.get_or_create(session_id).await)
    }
}
