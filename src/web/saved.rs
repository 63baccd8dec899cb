//! Saved-countries handlers. All require an identified user.

use crate::countries::Country;
use crate::countries::models::is_valid_code;
use crate::saved::MutationOutcome;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::identity::AuthUser;
use crate::web::{cache, with_cache_control};
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

#[derive(Serialize, TS)]
#[ts(export)]
pub struct SavedListResponse {
    pub countries: Vec<Country>,
    pub count: usize,
}

#[derive(Serialize, TS)]
#[ts(export)]
pub struct SavedStatusResponse {
    pub code: String,
    pub saved: bool,
    /// Whether this request changed the saved set.
    pub changed: bool,
}

fn parse_code(code: &str) -> Result<String, ApiError> {
    if is_valid_code(code) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ApiError::bad_request(format!("invalid country code '{code}'")))
    }
}

fn unexpected(outcome: MutationOutcome) -> ApiError {
    error!(?outcome, "saved set mutation did not apply for an identified user");
    match outcome {
        MutationOutcome::Anonymous => ApiError::unauthenticated(),
        _ => ApiError::internal_error("saved countries are not available yet"),
    }
}

/// `GET /api/saved`
pub(super) async fn list_saved(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Response {
    let countries = state.saved.list(&identity).await.unwrap_or_default();
    with_cache_control(
        SavedListResponse {
            count: countries.len(),
            countries,
        },
        cache::PRIVATE,
    )
}

/// `GET /api/saved/{code}`
pub(super) async fn saved_status(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let code = parse_code(&code)?;
    let saved = state.saved.contains(&identity, &code).await.unwrap_or(false);
    Ok(with_cache_control(
        SavedStatusResponse {
            code,
            saved,
            changed: false,
        },
        cache::PRIVATE,
    ))
}

/// `PUT /api/saved/{code}`: 201 when newly saved, 200 when already present.
pub(super) async fn save_country(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let code = parse_code(&code)?;
    let country = state
        .search
        .directory()
        .find(&code)
        .await
        .map_err(|e| ApiError::upstream("country directory unavailable", &e))?
        .ok_or_else(|| ApiError::not_found(format!("no country with code '{code}'")))?;
    let code = country.cca3.clone();

    let status = match state.saved.add(&identity, country).await {
        MutationOutcome::Added => StatusCode::CREATED,
        MutationOutcome::AlreadyPresent => StatusCode::OK,
        outcome => return Err(unexpected(outcome)),
    };
    Ok(mutation_response(status, code, true, status == StatusCode::CREATED))
}

/// `DELETE /api/saved/{code}`: idempotent.
pub(super) async fn unsave_country(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let code = parse_code(&code)?;
    let changed = match state.saved.remove(&identity, &code).await {
        MutationOutcome::Removed => true,
        MutationOutcome::NotPresent => false,
        outcome => return Err(unexpected(outcome)),
    };
    Ok(mutation_response(StatusCode::OK, code, false, changed))
}

fn mutation_response(status: StatusCode, code: String, saved: bool, changed: bool) -> Response {
    let mut response = (
        status,
        axum::Json(SavedStatusResponse {
            code,
            saved,
            changed,
        }),
    )
        .into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache::PRIVATE),
    );
    response
}
