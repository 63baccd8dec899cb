//! Request identity from the trusted auth-proxy header.
//!
//! Seeing a user opens their session and loads their saved set, mirroring a
//! sign-in on first contact.

use crate::saved::Identity;
use crate::state::AppState;
use crate::web::error::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// The caller's identity; anonymous when the header is absent or blank.
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get(&state.identity_header)
            .and_then(|v| v.to_str().ok());
        let identity = Identity::from_email(email);

        if let Some(user) = identity.user() {
            state.sessions.open(user.email());
            state.saved.ensure_loaded(&identity).await;
        }
        Ok(Self(identity))
    }
}

/// Like [`CurrentUser`], but rejects anonymous callers with 401.
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(CurrentUser(identity)) = CurrentUser::from_request_parts(parts, state).await;
        match identity {
            Identity::Anonymous => Err(ApiError::unauthenticated()),
            identity => Ok(Self(identity)),
        }
    }
}
