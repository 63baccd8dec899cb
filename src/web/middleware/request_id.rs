//! Request correlation: every request runs inside a `request` span tagged
//! with an ID, and the ID is echoed back in `X-Request-Id`.
//!
//! An inbound ID from a fronting proxy is kept when it is short and printable;
//! anything else is replaced by a fresh ULID.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

use crate::utils::fmt_duration;

pub const REQUEST_ID: &str = "x-request-id";

/// Longer inbound IDs are replaced rather than echoed into logs.
const MAX_INBOUND_ID_LEN: usize = 128;

/// The inbound ID when usable, otherwise a new ULID.
fn resolve_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_ID_LEN)
        .map_or_else(|| ulid::Ulid::new().to_string(), str::to_owned)
}

/// Successful and redirected requests log at debug, client errors at info,
/// everything else at warn.
fn log_response(status: StatusCode, elapsed: &str) {
    let status = status.as_u16();
    match status {
        0..=399 => tracing::debug!(status, duration = elapsed, "request completed"),
        400..=499 => tracing::info!(status, duration = elapsed, "request rejected"),
        _ => tracing::warn!(status, duration = elapsed, "request failed"),
    }
}

#[derive(Clone)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request> for RequestIdService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let request_id = resolve_request_id(req.headers());
        let header = HeaderValue::from_str(&request_id).ok();
        let span = tracing::info_span!(
            "request",
            req_id = %request_id,
            method = %req.method(),
            path = req.uri().path(),
        );

        let start = Instant::now();
        let inner = self.inner.call(req);

        Box::pin(
            async move {
                let mut result = inner.await;
                let elapsed = fmt_duration(start.elapsed());

                match &mut result {
                    Ok(response) => {
                        log_response(response.status(), &elapsed);
                        if let Some(value) = header {
                            response.headers_mut().insert(REQUEST_ID, value);
                        }
                    }
                    Err(e) => tracing::error!(error = ?e, duration = elapsed, "request errored"),
                }
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::convert::Infallible;
    use tower::ServiceExt;

    async fn call(request: Request) -> Response {
        let inner = tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>(Response::new(Body::empty()))
        });
        RequestIdLayer.layer(inner).oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn reuses_inbound_request_id() {
        let request = axum::http::Request::builder()
            .uri("/api/health")
            .header(REQUEST_ID, "edge-1234")
            .body(Body::empty())
            .unwrap();
        let response = call(request).await;
        assert_eq!(response.headers()[REQUEST_ID], "edge-1234");
    }

    #[tokio::test]
    async fn generates_an_id_when_absent_or_oversized() {
        let oversized = "x".repeat(MAX_INBOUND_ID_LEN + 1);
        for inbound in [None, Some(oversized.as_str())] {
            let mut builder = axum::http::Request::builder().uri("/api/health");
            if let Some(id) = inbound {
                builder = builder.header(REQUEST_ID, id);
            }
            let response = call(builder.body(Body::empty()).unwrap()).await;
            let id = response.headers()[REQUEST_ID].to_str().unwrap();
            assert!(ulid::Ulid::from_string(id).is_ok(), "{id}");
        }
    }

    #[test]
    fn blank_inbound_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID, HeaderValue::from_static("   "));
        let id = resolve_request_id(&headers);
        assert_eq!(id.len(), 26);
    }
}
