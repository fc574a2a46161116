//! Paired-extension credential, read before every request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::KeyValueStore;

const KEY_SESSION_TOKEN: &str = "sessionToken";
const KEY_USER_EMAIL: &str = "userEmail";
const KEY_USER_ID: &str = "userId";
const KEY_WORKSPACE_ID: &str = "workspaceId";
const KEY_EXPIRES_AT: &str = "expiresAt";

const ALL_KEYS: [&str; 5] = [
    KEY_SESSION_TOKEN,
    KEY_USER_EMAIL,
    KEY_USER_ID,
    KEY_WORKSPACE_ID,
    KEY_EXPIRES_AT,
];

/// How a request authenticates against the explanation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Paired extension token, sent as `x-extension-token`
    Extension(String),
    /// Web session token, sent as the `session_token` cookie
    Session(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub session_token: String,
    pub user_email: Option<String>,
    pub user_id: Option<String>,
    pub workspace_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            user_email: None,
            user_id: None,
            workspace_id: None,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn credential(&self) -> Credential {
        Credential::Extension(self.session_token.clone())
    }
}

/// Credential storage. The pipeline only reads; pairing writes and
/// disconnect clears.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Current credentials, or `None` when unpaired or expired. Expired
    /// credentials are cleared on read.
    pub async fn load(&self) -> Result<Option<StoredCredentials>> {
        let Some(session_token) = self.string(KEY_SESSION_TOKEN).await? else {
            return Ok(None);
        };
        if session_token.is_empty() {
            return Ok(None);
        }

        let credentials = StoredCredentials {
            session_token,
            user_email: self.string(KEY_USER_EMAIL).await?,
            user_id: self.string(KEY_USER_ID).await?,
            workspace_id: self.string(KEY_WORKSPACE_ID).await?,
            expires_at: self.timestamp(KEY_EXPIRES_AT).await?,
        };

        if credentials.is_expired(Utc::now()) {
            info!("stored credential expired, clearing");
            self.clear().await?;
            return Ok(None);
        }
        Ok(Some(credentials))
    }

    pub async fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        self.storage
            .set(KEY_SESSION_TOKEN, Value::String(credentials.session_token.clone()))
            .await?;
        self.put_optional(KEY_USER_EMAIL, credentials.user_email.clone()).await?;
        self.put_optional(KEY_USER_ID, credentials.user_id.clone()).await?;
        self.put_optional(KEY_WORKSPACE_ID, credentials.workspace_id.clone()).await?;
        self.put_optional(KEY_EXPIRES_AT, credentials.expires_at.map(|t| t.to_rfc3339()))
            .await?;
        Ok(())
    }

    /// Disconnect.
    pub async fn clear(&self) -> Result<()> {
        for key in ALL_KEYS {
            self.storage.remove(key).await?;
        }
        debug!("credentials cleared");
        Ok(())
    }

    async fn put_optional(&self, key: &str, value: Option<String>) -> Result<()> {
        match value {
            Some(value) => self.storage.set(key, Value::String(value)).await,
            None => self.storage.remove(key).await,
        }
    }

    async fn string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.storage.get(key).await? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }

    /// RFC 3339 string or epoch milliseconds.
    async fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(match self.storage.get(key).await? {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        })
    }
}
