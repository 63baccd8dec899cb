//! Shared fixtures: an in-process fake of every upstream API and a wired `AppState`.

#![allow(dead_code)]

use atlas::config::Config;
use atlas::saved::{MemoryKvStore, SessionMirror, SessionStore};
use atlas::state::AppState;
use axum::Router;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const TEST_USER: &str = "alice@example.test";

/// Counts upstream hits so tests can assert on caching.
#[derive(Default)]
pub struct Hits {
    pub directory: AtomicUsize,
    pub detail: AtomicUsize,
    pub weather: AtomicUsize,
}

impl Hits {
    pub fn directory(&self) -> usize {
        self.directory.load(Ordering::SeqCst)
    }
}

fn country(code: &str, name: &str, region: &str, capitals: &[&str]) -> Value {
    json!({
        "name": {"common": name, "official": format!("Official {name}"), "nativeName": {}},
        "capital": capitals,
        "region": region,
        "flags": {
            "png": format!("https://flags.test/{code}.png"),
            "svg": format!("https://flags.test/{code}.svg"),
        },
        "cca3": code,
    })
}

pub fn directory_payload() -> Value {
    json!([
        country("JPN", "Japan", "Asia", &["Tokyo"]),
        country("FRA", "France", "Europe", &["Paris"]),
        country("ALA", "Åland Islands", "Europe", &["Mariehamn"]),
        country("IRN", "Iran", "Asia", &["Tehran"]),
        country("BRA", "Brazil", "Americas", &["Brasília"]),
        country("DEU", "Germany", "Europe", &["Berlin"]),
        country("ATA", "Antarctica", "Antarctic", &[]),
    ])
}

fn france_detail() -> Value {
    let mut detail = country("FRA", "France", "Europe", &["Paris"]);
    let extra = json!({
        "subregion": "Western Europe",
        "population": 67391582,
        "area": 551695.0,
        "languages": {"fra": "French"},
        "currencies": {"EUR": {"name": "Euro", "symbol": "€"}},
        "maps": {
            "googleMaps": "https://goo.gl/maps/france",
            "openStreetMaps": "https://www.openstreetmap.org/relation/1403916"
        }
    });
    if let (Some(base), Some(extra)) = (detail.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    detail
}

/// Serve fake upstreams on an ephemeral port; returns the base URL.
///
/// With `healthy == false` every endpoint answers 503.
pub async fn spawn_upstream(hits: Arc<Hits>, healthy: bool) -> String {
    let directory_hits = hits.clone();
    let detail_hits = hits.clone();
    let weather_hits = hits;

    let router = Router::new()
        .route(
            "/v3.1/all",
            get(move || {
                let hits = directory_hits.clone();
                async move {
                    hits.directory.fetch_add(1, Ordering::SeqCst);
                    if !healthy {
                        return StatusCode::SERVICE_UNAVAILABLE.into_response();
                    }
                    Json(directory_payload()).into_response()
                }
            }),
        )
        .route(
            "/v3.1/alpha/{code}",
            get(move |Path(code): Path<String>| {
                let hits = detail_hits.clone();
                async move {
                    hits.detail.fetch_add(1, Ordering::SeqCst);
                    match (healthy, code.as_str()) {
                        (false, _) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
                        (true, "FRA") => Json(json!([france_detail()])).into_response(),
                        (true, _) => (
                            StatusCode::NOT_FOUND,
                            Json(json!({"status": 404, "message": "Not Found"})),
                        )
                            .into_response(),
                    }
                }
            }),
        )
        .route(
            "/weather/weather",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let hits = weather_hits.clone();
                async move {
                    hits.weather.fetch_add(1, Ordering::SeqCst);
                    if !healthy || params.get("appid").map(String::as_str) != Some("weather-key") {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    let place = params.get("q").cloned().unwrap_or_default();
                    Json(json!({
                        "weather": [{"main": "Clear", "description": "clear sky", "icon": "01d"}],
                        "main": {"temp": 18.5, "feels_like": 17.9, "humidity": 60},
                        "wind": {"speed": 4.1},
                        "visibility": 10000,
                        "name": place,
                    }))
                    .into_response()
                }
            }),
        )
        .route("/unsplash/search/photos", get(photos))
        .route("/wiki/page/summary/{subject}", get(summary));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture upstream");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fixture upstream");
    });
    format!("http://{addr}")
}

async fn photos(
    headers: axum::http::HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Client-ID photo-key") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let count: usize = params
        .get("per_page")
        .and_then(|n| n.parse().ok())
        .unwrap_or(10);
    let results: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("photo-{i}"),
                "description": null,
                "alt_description": params.get("query"),
                "urls": {"regular": format!("https://images.test/{i}"), "small": null},
                "links": {"html": format!("https://unsplash.test/photos/{i}")},
                "user": {"name": "Fixture", "links": {"html": "https://unsplash.test/@fixture"}}
            })
        })
        .collect();
    Json(json!({"total": count, "total_pages": 1, "results": results})).into_response()
}

async fn summary(Path(subject): Path<String>) -> Response {
    if subject != "France" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "title": "France",
        "extract": "France is a country in Western Europe.",
        "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/France"}}
    }))
    .into_response()
}

pub fn config_for(base: &str) -> Config {
    Config {
        countries_base_url: format!("{base}/v3.1"),
        weather_base_url: format!("{base}/weather"),
        weather_api_key: Some("weather-key".into()),
        unsplash_base_url: format!("{base}/unsplash"),
        unsplash_access_key: Some("photo-key".into()),
        wikipedia_base_url: format!("{base}/wiki"),
        ..Config::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub hits: Arc<Hits>,
    pub kv: Arc<MemoryKvStore>,
    pub shutdown: CancellationToken,
}

impl TestApp {
    /// Wait for the session mirror to deliver `expected` for `email`.
    pub async fn session_codes(&self, email: &str, expected: &[&str]) -> Vec<String> {
        let mut codes = Vec::new();
        for _ in 0..100 {
            codes = self
                .state
                .sessions
                .snapshot(email)
                .map(|s| s.saved_countries)
                .unwrap_or_default();
            if codes == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        codes
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub async fn test_app(healthy: bool) -> TestApp {
    let hits = Arc::new(Hits::default());
    let base = spawn_upstream(hits.clone(), healthy).await;
    let kv = Arc::new(MemoryKvStore::new());
    let sessions = Arc::new(SessionStore::new());
    let shutdown = CancellationToken::new();
    let (mirror, _worker) = SessionMirror::spawn(sessions.clone(), shutdown.clone());
    let state = AppState::new(&config_for(&base), kv.clone(), sessions, Some(mirror))
        .expect("app state");
    TestApp {
        router: atlas::web::create_router(state.clone()),
        state,
        hits,
        kv,
        shutdown,
    }
}
