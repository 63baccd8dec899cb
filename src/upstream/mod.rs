//! Clients for the third-party REST APIs this service composes.
//!
//! All clients share one `reqwest_middleware` client and the process-wide
//! [`ResponseCache`](crate::cache::ResponseCache). Only the country directory
//! surfaces errors to callers; the detail-page sources degrade to empty results.

pub mod countries;
pub mod encyclopedia;
pub mod errors;
pub mod json;
pub mod middleware;
pub mod photos;
pub mod weather;

pub use errors::FetchError;

use anyhow::Context;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

/// Build the shared outbound client.
///
/// No request timeout is set: a hung upstream holds the calling request until
/// the HTTP layer's global timeout fires.
pub fn build_client() -> anyhow::Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("atlas/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(ClientBuilder::new(client)
        .with(middleware::TransactionLogger)
        .build())
}

/// Host and path only; credentials travel in query strings.
pub(crate) fn redact(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}

/// Decode a successful JSON response, mapping non-2xx statuses to [`FetchError::Status`].
pub(crate) async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &Url,
) -> Result<T, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: redact(url),
        });
    }
    let body = response.text().await?;
    json::parse_json_with_context(&body).map_err(|source| FetchError::ParseFailed {
        url: redact(url),
        source,
    })
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &Url,
) -> Result<T, FetchError> {
    let response = request.send().await?;
    decode(response, url).await
}

/// Join a configured base URL and a path, tolerating a trailing slash on the base.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, FetchError> {
    Ok(Url::parse(&format!("{}{path}", base.trim_end_matches('/')))?)
}
