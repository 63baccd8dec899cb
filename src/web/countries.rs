//! Country list, region and detail handlers.

use crate::countries::CountryResponse;
use crate::countries::models::{CountryDetail, is_valid_code};
use crate::state::AppState;
use crate::sync::SearchState;
use crate::upstream::encyclopedia::Summary;
use crate::upstream::photos::Photo;
use crate::upstream::weather::Weather;
use crate::web::error::ApiError;
use crate::web::identity::CurrentUser;
use crate::web::{cache, with_cache_control};
use axum::extract::{Path, RawQuery, State};
use axum::response::Response;
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

/// Photos shown on a detail page.
const DETAIL_PHOTO_COUNT: u32 = 6;

#[derive(Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CountryListResponse {
    #[serde(flatten)]
    pub page: CountryResponse,
    /// Canonical query string for this search, without the leading `?`.
    pub query: String,
}

#[derive(Serialize, TS)]
#[ts(export)]
pub struct RegionsResponse {
    pub regions: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryDetailResponse {
    pub country: CountryDetail,
    /// `None` for anonymous callers.
    pub saved: Option<bool>,
    pub weather: Option<Weather>,
    /// Icon for the current conditions, when weather is present.
    pub weather_icon: Option<String>,
    pub photos: Vec<Photo>,
    pub summary: Option<Summary>,
}

/// `GET /api/countries?q=&region=&page=&limit=`
pub(super) async fn list_countries(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let search = SearchState::from_query(query.as_deref().unwrap_or_default());
    let page = state
        .search
        .query(&search.to_filter())
        .await
        .map_err(|e| ApiError::upstream("country directory unavailable", &e))?;

    Ok(with_cache_control(
        CountryListResponse {
            page,
            query: search.to_query(),
        },
        cache::SEARCH,
    ))
}

/// `GET /api/regions`
pub(super) async fn list_regions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let regions = state
        .search
        .unique_regions()
        .await
        .map_err(|e| ApiError::upstream("country directory unavailable", &e))?;
    Ok(with_cache_control(RegionsResponse { regions }, cache::REFERENCE))
}

/// `GET /api/countries/{code}`
///
/// The record itself is required; weather, photos and the summary are
/// best-effort and fetched concurrently once the record is known.
pub(super) async fn get_country(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    if !is_valid_code(&code) {
        return Err(ApiError::bad_request(format!("invalid country code '{code}'")));
    }

    let detail = state
        .countries
        .fetch_by_code(&code)
        .await
        .map_err(|e| ApiError::upstream("country detail unavailable", &e))?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "no country with code '{}'",
                code.to_ascii_uppercase()
            ))
        })?;

    let name = detail.country.name.common.clone();
    let capital = detail.country.primary_capital().map(str::to_owned);
    let photo_query = format!("{name} landscape");

    let (weather, photos, summary, saved) = tokio::join!(
        async {
            match capital.as_deref() {
                Some(capital) => state.weather.current(capital).await,
                None => None,
            }
        },
        state.photos.search(&photo_query, DETAIL_PHOTO_COUNT),
        state.encyclopedia.summary(&name),
        state.saved.contains(&identity, detail.country.code()),
    );

    debug!(
        code = detail.country.code(),
        weather = weather.is_some(),
        photos = photos.len(),
        summary = summary.is_some(),
        "country detail composed"
    );

    Ok(with_cache_control(
        CountryDetailResponse {
            country: (*detail).clone(),
            saved,
            weather_icon: weather.as_ref().and_then(|w| w.icon_url()),
            weather: weather.map(|w| (*w).clone()),
            photos: (*photos).clone(),
            summary,
        },
        cache::PRIVATE_SHORT,
    ))
}
