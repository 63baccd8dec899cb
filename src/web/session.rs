//! Session handlers.

use crate::saved::{Identity, SessionSnapshot};
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::identity::{AuthUser, CurrentUser};
use crate::web::{cache, with_cache_control};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use tracing::info;

/// `GET /api/auth/session`
pub(super) async fn get_session(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Response, ApiError> {
    let user = identity.user().ok_or_else(ApiError::unauthenticated)?;
    let snapshot: SessionSnapshot = state
        .sessions
        .snapshot(user.email())
        .unwrap_or_else(|| state.sessions.open(user.email()));
    Ok(with_cache_control(snapshot, cache::PRIVATE))
}

/// `DELETE /api/auth/session`: forget the session and the in-memory saved set.
///
/// Persisted saved countries survive and are restored on the next request.
pub(super) async fn end_session(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> StatusCode {
    if let Identity::User(user) = &identity {
        state.sessions.close(user.email());
        state.saved.unload(&identity);
        info!(user = %user, "session ended");
    }
    StatusCode::NO_CONTENT
}
