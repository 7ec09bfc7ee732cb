use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::trading::ledger::Session;

pub type SharedSession = Arc<Mutex<Session>>;

/// One independent session per user. Each session sits behind its own mutex so
/// ledger operations on it never interleave, while different users never contend.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's session, creating an idle one on first use.
    pub async fn session(&self, user: &str) -> SharedSession {
        if let Some(s) = self.sessions.read().await.get(user) {
            return s.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user.to_string())
            .or_insert_with(|| {
                debug!("New session for user '{}'", user);
                Arc::new(Mutex::new(Session::new()))
            })
            .clone()
    }

    /// Replaces the user's session, e.g. after loading a snapshot.
    pub async fn replace(&self, user: &str, session: Session) -> SharedSession {
        let shared = Arc::new(Mutex::new(session));
        self.sessions
            .write()
            .await
            .insert(user.to_string(), shared.clone());
        shared
    }

    pub async fn remove(&self, user: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(user)
    }

    pub async fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        users.sort();
        users
    }
}
