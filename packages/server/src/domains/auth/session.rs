use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cookie carrying the web session token.
pub const SESSION_COOKIE: &str = "session_token";

const SESSION_TTL_HOURS: i64 = 24;

/// Signed-in web user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub workspace_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            workspace_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_hours() >= SESSION_TTL_HOURS
    }
}

/// Resolves a session token to a signed-in user.
#[async_trait]
pub trait SessionLookup: Send + Sync {
    async fn lookup(&self, token: &str) -> Option<Session>;
}

/// In-memory session store
///
/// Sessions expire after 24 hours
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and return its token
    pub async fn create_session(&self, session: Session) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    pub async fn delete_session(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Drop expired sessions (run periodically)
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let now = chrono::Utc::now();
        sessions.retain(|_, session| !session.is_expired(now));
        before - sessions.len()
    }
}

#[async_trait]
impl SessionLookup for SessionStore {
    async fn lookup(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;

        if session.is_expired(chrono::Utc::now()) {
            return None;
        }
        Some(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lookup() {
        let store = SessionStore::new();
        let token = store.create_session(Session::new("user-1", "a@example.com")).await;

        let session = store.lookup(&token).await.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert!(store.lookup("unknown").await.is_none());

        store.delete_session(&token).await;
        assert!(store.lookup(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_session_expiration() {
        let store = SessionStore::new();
        let mut session = Session::new("user-1", "a@example.com");
        session.created_at = chrono::Utc::now() - chrono::Duration::hours(25);

        let token = store.create_session(session).await;
        assert!(store.lookup(&token).await.is_none(), "Expired session should return None");
        assert_eq!(store.cleanup_expired().await, 1);
    }
}
