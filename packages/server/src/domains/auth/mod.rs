//! Authentication collaborators: web sessions and paired-extension credentials.

pub mod extension_token;
pub mod session;

pub use extension_token::{ExtensionClaims, ExtensionTokenService, EXTENSION_TOKEN_TTL_HOURS};
pub use session::{Session, SessionLookup, SessionStore, SESSION_COOKIE};

/// How a request proved who it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Session,
    ExtensionToken,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub workspace_id: Option<String>,
    pub method: AuthMethod,
}

impl From<Session> for AuthContext {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            workspace_id: session.workspace_id,
            method: AuthMethod::Session,
        }
    }
}

impl From<ExtensionClaims> for AuthContext {
    fn from(claims: ExtensionClaims) -> Self {
        Self {
            user_id: claims.sub,
            workspace_id: claims.workspace_id,
            method: AuthMethod::ExtensionToken,
        }
    }
}
