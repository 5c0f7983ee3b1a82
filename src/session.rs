use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::SESSION_IDLE_TTL;
use crate::roadmap::RoadmapModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// One-shot message shown on the next render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    /// Raw text shown verbatim under the message, e.g. an unparseable model reply.
    pub detail: Option<String>,
}

/// Everything one connected client owns.
#[derive(Debug, Default)]
pub struct Session {
    pub api_key: Option<String>,
    pub model: RoadmapModel,
    pub last_idea: String,
    pub last_tools: Option<String>,
    notice: Option<Notice>,
}

impl Session {
    pub fn success(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Success,
            text: text.into(),
            detail: None,
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.error_with_detail(text, None);
    }

    pub fn error_with_detail(&mut self, text: impl Into<String>, detail: Option<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            text: text.into(),
            detail,
        });
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Sessions by cookie id. Each session has its own lock so a slow generation only blocks the
/// client that started it. Idle sessions are evicted on lookup.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(SESSION_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_ttl,
        }
    }

    /// Returns the session for `id`, creating one (with a fresh id) when `id` is unknown or expired.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, SessionHandle) {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);

        if let Some(id) = id {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = Instant::now();
                return (id, entry.handle.clone());
            }
        }

        let id = Uuid::new_v4();
        let handle = SessionHandle::default();
        sessions.insert(
            id,
            Entry {
                handle: handle.clone(),
                last_seen: Instant::now(),
            },
        );
        debug!(session = %id, live = sessions.len(), "Created session");
        (id, handle)
    }

    // A session still held by an in-flight request is kept even when idle.
    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Entry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_seen.elapsed() <= self.idle_ttl || Arc::strong_count(&entry.handle) > 1
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, live = sessions.len(), "Evicted idle sessions");
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
