//! Caller resolution middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use specwright_shared::Identity;

use super::supabase::SupabaseAuth;

/// The resolved caller, `None` when anonymous
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Attach a [`Caller`] to every request.
///
/// Missing or unverifiable credentials produce an anonymous caller rather than
/// a 401, so entitlement checks still answer with the free tier.
pub async fn resolve_caller(State(auth): State<SupabaseAuth>, mut request: Request, next: Next) -> Response {
    let token = bearer_token(request.headers()).map(str::to_owned);

    let identity = match token {
        Some(token) => match auth.verify(&token).await {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Bearer token not verified, treating caller as anonymous");
                None
            }
        },
        None => None,
    };

    request.extensions_mut().insert(Caller(identity));
    next.run(request).await
}
