use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::user::canonical_username;

struct Session {
    username: String,
    expires_at: Instant,
}

/// Opaque bearer-token sessions held in memory
///
/// Tokens are random UUIDs mapped to a canonical username. A session expires
/// `ttl` after it is created; expired sessions are dropped when looked up
/// and whenever a new session is opened.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Opens a session for `username` and returns its token
    pub async fn create(&self, username: &str) -> Uuid {
        let now = Instant::now();
        let token = Uuid::new_v4();
        let session = Session {
            username: canonical_username(username),
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| now < session.expires_at);
        sessions.insert(token, session);
        token
    }

    /// Username owning `token`, if the session exists and has not expired
    pub async fn resolve(&self, token: Uuid) -> Option<String> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&token) {
                Some(session) if Instant::now() < session.expires_at => {
                    return Some(session.username.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }

        self.sessions.write().await.remove(&token);
        None
    }

    pub async fn revoke(&self, token: Uuid) {
        self.sessions.write().await.remove(&token);
    }

    /// Ends every session belonging to `username`
    pub async fn revoke_user(&self, username: &str) {
        let username = canonical_username(username);
        self.sessions
            .write()
            .await
            .retain(|_, session| session.username != username);
    }

    /// Points the sessions of a renamed user at the new username
    pub async fn rename_user(&self, username: &str, new_username: &str) {
        let username = canonical_username(username);
        let new_username = canonical_username(new_username);

        for session in self.sessions.write().await.values_mut() {
            if session.username == username {
                session.username = new_username.clone();
            }
        }
    }
}
