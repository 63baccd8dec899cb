//! Request logging for outbound upstream calls.

use crate::utils::{fmt_duration, log_if_slow};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SLOW_UPSTREAM: Duration = Duration::from_secs(2);

/// Logs method, host, path, status and latency of every upstream request.
///
/// Query strings are never logged: several upstreams take their credential
/// as a query parameter.
pub struct TransactionLogger;

#[async_trait::async_trait]
impl Middleware for TransactionLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let host = req.url().host_str().unwrap_or_default().to_string();
        let path = req.url().path().to_string();
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed = log_if_slow(start, SLOW_UPSTREAM, "upstream request");

        match &result {
            Ok(response) => debug!(
                method = %method,
                host = %host,
                path = %path,
                status = response.status().as_u16(),
                duration = fmt_duration(elapsed),
                "upstream response"
            ),
            Err(e) => warn!(
                method = %method,
                host = %host,
                path = %path,
                error = %e,
                duration = fmt_duration(elapsed),
                "upstream request failed"
            ),
        }

        result
    }
}
