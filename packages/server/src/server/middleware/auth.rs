use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::domains::auth::{AuthContext, SESSION_COOKIE};
use crate::kernel::ServerDeps;

/// Header carrying the paired-extension credential.
pub const EXTENSION_TOKEN_HEADER: &str = "x-extension-token";

/// Authentication middleware
///
/// Resolves the caller from the session cookie first, then from the
/// extension credential header, and adds `AuthContext` to request extensions.
/// Requests without valid credentials continue unauthenticated; handlers
/// decide whether that is allowed.
pub async fn auth_middleware(deps: ServerDeps, mut request: Request<Body>, next: Next) -> Response {
    match resolve_auth(&deps, request.headers()).await {
        Some(auth) => {
            debug!(user_id = %auth.user_id, method = ?auth.method, "authenticated request");
            request.extensions_mut().insert(auth);
        }
        None => debug!("no valid credentials"),
    }

    next.run(request).await
}

pub async fn resolve_auth(deps: &ServerDeps, headers: &HeaderMap) -> Option<AuthContext> {
    if let Some(token) = session_token(headers) {
        if let Some(session) = deps.sessions.lookup(&token).await {
            return Some(session.into());
        }
    }

    let token = headers.get(EXTENSION_TOKEN_HEADER)?.to_str().ok()?;
    let claims = deps.extension_tokens.verify(token.trim()).ok()?;
    Some(claims.into())
}

/// Session token from the cookie, falling back to `Authorization: Bearer`.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        value.strip_prefix("Bearer ").map(|token| token.trim().to_string())
    })
}
