//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use std::time::Duration;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{countries, saved, session, status};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

/// Bound on a whole request, including upstream calls that have no timeout of their own.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cache-Control presets.
pub mod cache {
    /// Region list; changes only when the directory refreshes.
    pub const REFERENCE: &str = "public, max-age=300, s-maxage=3600, stale-while-revalidate=300";
    /// Filtered country pages.
    pub const SEARCH: &str = "public, max-age=60, s-maxage=300, stale-while-revalidate=120";
    /// Per-caller payloads that are still cheap to reuse briefly.
    pub const PRIVATE_SHORT: &str = "private, max-age=60";
    /// Saved sets and sessions; never cached.
    pub const PRIVATE: &str = "private, no-store, must-revalidate";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/countries", get(countries::list_countries))
        .route("/countries/{code}", get(countries::get_country))
        .route("/regions", get(countries::list_regions))
        .route("/saved", get(saved::list_saved))
        .route(
            "/saved/{code}",
            get(saved::saved_status)
                .put(saved::save_country)
                .delete(saved::unsave_country),
        )
        .route(
            "/auth/session",
            get(session::get_session).delete(session::end_session),
        )
        .with_state(app_state);

    // The identity header is set by the auth proxy, so browsers never send it cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::RETRY_AFTER, header::HeaderName::from_static("x-request-id")]);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        cors,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(REQUEST_TIMEOUT),
    ))
}
