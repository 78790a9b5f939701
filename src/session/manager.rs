//! Session lifecycle management

use crate::error::PulseResult;
use crate::session::state::Session;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Session manager pins one image per process
///
/// Sessions are keyed by `ppulse-{pid}` with no timestamp, so every caller
/// sharing a manager sees the same image and content hash for its lifetime.
pub struct SessionManager {
    image_dir: PathBuf,
    pid: u32,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    /// Create a session manager for the current process
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self::with_pid(image_dir, std::process::id())
    }

    /// Create a session manager bound to another process (e.g. the parent
    /// shell)
    pub fn with_pid(image_dir: impl Into<PathBuf>, pid: u32) -> Self {
        Self {
            image_dir: image_dir.into(),
            pid,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Identifier of the session this manager creates
    pub fn current_id(&self) -> String {
        Session::id_for_pid(self.pid)
    }

    /// Get the session for this process, creating it on first use
    pub async fn get_or_create(&self) -> PulseResult<Arc<Session>> {
        let id = self.current_id();

        if let Some(session) = self.sessions.read().await.get(&id) {
            return Ok(Arc::clone(session));
        }

        // Select and hash without holding the lock
        let created = Session::create(id.clone(), &self.image_dir).await?;

        let mut sessions = self.sessions.write().await;
        // Another caller may have installed a session meanwhile; theirs wins
        let session = sessions
            .entry(id)
            .or_insert_with(|| {
                info!("Created session: {}", created.id);
                Arc::new(created)
            })
            .clone();
        Ok(session)
    }

    /// Get a session by ID
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Close a session; returns whether it existed
    pub async fn close(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!("Closed session: {}", id);
        }
        removed
    }

    /// Drop sessions created more than `max_age` ago
    pub async fn clean_stale(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.created_at >= cutoff);
        let cleaned = before - sessions.len();

        if cleaned > 0 {
            info!("Cleaned up {} stale session(s)", cleaned);
        }
        cleaned
    }

    /// Get active session count
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
