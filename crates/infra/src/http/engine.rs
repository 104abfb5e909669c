//! The request engine: descriptor in, normalized result out.
//!
//! `execute` is infallible by design. Transport errors, auth rejections,
//! decode failures, and provider errors all come back as `ok == false`
//! [`CallResult`]s so callers have exactly one outcome shape to handle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use centralkit_core::{ApiExecutor, TokenManager};
use centralkit_domain::{CallDescriptor, CallResult, Method, Page, Payload, RateLimitInfo};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("centralkit/", env!("CARGO_PKG_VERSION"));

/// Body marker Central puts in 401 responses caused by a stale token, as
/// opposed to 401s for missing scopes or disabled accounts.
const INVALID_TOKEN_MARKER: &str = "invalid_token";

/// One refresh-and-retry per call, tracked as an explicit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshState {
    NotAttempted,
    Done,
}

/// Executes [`CallDescriptor`]s against one Central cluster.
pub struct RequestEngine {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
}

impl RequestEngine {
    /// Start building an engine for `base_url`.
    #[must_use]
    pub fn builder(base_url: Url, tokens: Arc<TokenManager>) -> RequestEngineBuilder {
        RequestEngineBuilder { base_url, tokens, timeout: DEFAULT_TIMEOUT }
    }

    /// Execute one logical call: bearer auth, the single 401 refresh-retry,
    /// and full page collection when the descriptor is paginated.
    pub async fn execute(&self, descriptor: &CallDescriptor) -> CallResult {
        let started = Instant::now();
        let mut result = match descriptor.page {
            // Zero limit cannot paginate; treat as a plain call.
            Some(page) if page.limit > 0 => self.collect_pages(descriptor, page).await,
            _ => self.run_call(descriptor, None).await,
        };
        result.elapsed = started.elapsed();

        if !result.ok {
            warn!(
                method = %descriptor.method,
                path = %descriptor.path,
                status = result.status,
                error = result.error.as_deref().unwrap_or(""),
                "call failed"
            );
        }
        result
    }

    /// Sequentially fetch pages until one comes back short, merging as we go.
    async fn collect_pages(&self, descriptor: &CallDescriptor, first: Page) -> CallResult {
        let mut page = first;
        let mut merged: Option<Value> = None;
        loop {
            let result = self.run_call(descriptor, Some(page)).await;
            if !result.ok {
                // A partial collection is not a success; surface the page
                // that broke the run.
                return result;
            }

            let items = match result.output.as_json() {
                Some(value) => page_item_count(value),
                None => 0,
            };
            debug!(path = %descriptor.path, offset = page.offset, items, "page collected");

            // Empty bodies contribute nothing; folding them in would turn
            // the combined payload into JSON null.
            if let Payload::Json(page_value) = result.output {
                merged = Some(match merged {
                    None => page_value,
                    Some(mut acc) => {
                        merge_pages(&mut acc, page_value);
                        acc
                    }
                });
            }

            if items < page.limit {
                let output = merged.map_or(Payload::Empty, Payload::Json);
                let mut combined = CallResult::success(result.status, output, Duration::ZERO);
                combined.rate_limit = result.rate_limit;
                return combined;
            }
            page.offset += page.limit;
        }
    }

    /// One HTTP round-trip, plus the single token-refresh retry.
    async fn run_call(&self, descriptor: &CallDescriptor, page: Option<Page>) -> CallResult {
        let mut refresh = RefreshState::NotAttempted;
        loop {
            let token = match self.tokens.access_token().await {
                Ok(token) => token,
                // Never reached the wire; auth text rides the sentinel.
                Err(e) => return CallResult::transport_failure(e.to_string(), Duration::ZERO),
            };

            let url = match self.build_url(descriptor, page) {
                Ok(url) => url,
                Err(e) => return CallResult::transport_failure(e, Duration::ZERO),
            };

            let mut request = self
                .http
                .request(reqwest_method(descriptor.method), url)
                .bearer_auth(&token);
            if let Some(body) = &descriptor.body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let detail = if e.is_timeout() { "timed out" } else { "failed" };
                    return CallResult::transport_failure(
                        format!("request to {} {detail}: {e}", descriptor.path),
                        Duration::ZERO,
                    );
                }
            };

            let status = response.status();
            let rate_limit = parse_rate_limit(response.headers());
            let retry_after = parse_retry_after(response.headers());

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    return CallResult::transport_failure(
                        format!("reading response body failed: {e}"),
                        Duration::ZERO,
                    )
                }
            };

            if status == StatusCode::UNAUTHORIZED
                && text.contains(INVALID_TOKEN_MARKER)
                && refresh == RefreshState::NotAttempted
            {
                debug!(path = %descriptor.path, "401 invalid_token, refreshing");
                match self.tokens.refresh_after_rejection(&token).await {
                    Ok(_) => {
                        refresh = RefreshState::Done;
                        continue;
                    }
                    Err(e) => {
                        let mut result = CallResult::failure(
                            status.as_u16(),
                            Payload::Text(text),
                            format!("token refresh failed: {e}"),
                            Duration::ZERO,
                        );
                        result.rate_limit = rate_limit;
                        return result;
                    }
                }
            }

            let mut result = normalize_response(status, text);
            result.rate_limit = rate_limit;
            result.retry_after = retry_after;
            return result;
        }
    }

    fn build_url(&self, descriptor: &CallDescriptor, page: Option<Page>) -> Result<Url, String> {
        let mut url = self
            .base_url
            .join(&descriptor.path)
            .map_err(|e| format!("invalid path {}: {e}", descriptor.path))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &descriptor.query {
                query.append_pair(key, value);
            }
            if let Some(page) = page {
                query.append_pair("limit", &page.limit.to_string());
                query.append_pair("offset", &page.offset.to_string());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ApiExecutor for RequestEngine {
    async fn execute(&self, descriptor: &CallDescriptor) -> CallResult {
        RequestEngine::execute(self, descriptor).await
    }
}

/// Builder mirroring the client options callers actually tune.
pub struct RequestEngineBuilder {
    base_url: Url,
    tokens: Arc<TokenManager>,
    timeout: Duration,
}

impl RequestEngineBuilder {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    /// `CentralError::Config` when the TLS backend cannot initialize.
    pub fn build(self) -> centralkit_domain::Result<RequestEngine> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                centralkit_domain::CentralError::Config(format!("http client init failed: {e}"))
            })?;
        Ok(RequestEngine { http, base_url: self.base_url, tokens: self.tokens })
    }
}

/// Turn a completed HTTP exchange into a [`CallResult`].
///
/// A 2xx with an undecodable body is a failure that keeps the raw text, so
/// callers can still see what the provider sent.
fn normalize_response(status: StatusCode, text: String) -> CallResult {
    let decoded: Option<Value> = serde_json::from_str(&text).ok();

    if status.is_success() {
        return match decoded {
            Some(value) => CallResult::success(status.as_u16(), Payload::Json(value), Duration::ZERO),
            None if text.trim().is_empty() => {
                CallResult::success(status.as_u16(), Payload::Empty, Duration::ZERO)
            }
            None => CallResult::failure(
                status.as_u16(),
                Payload::Text(text),
                "response body is not valid JSON",
                Duration::ZERO,
            ),
        };
    }

    // Provider error text verbatim; fall back to the status line.
    let error = if text.trim().is_empty() {
        format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("error"))
    } else {
        text.clone()
    };
    let payload = match decoded {
        Some(value) => Payload::Json(value),
        None if text.is_empty() => Payload::Empty,
        None => Payload::Text(text),
    };
    CallResult::failure(status.as_u16(), payload, error, Duration::ZERO)
}

/// Merge law for paginated responses.
///
/// - array + array: concatenate
/// - object + object: key-wise, array values concatenate, everything else is
///   last-write-wins (so `total`, cursors etc. reflect the final page while
///   the item list under e.g. `"sites"` accumulates)
/// - any other combination: the newer page replaces the older value
fn merge_pages(acc: &mut Value, next: Value) {
    match (acc, next) {
        (Value::Array(items), Value::Array(more)) => items.extend(more),
        (Value::Object(map), Value::Object(next_map)) => {
            for (key, value) in next_map {
                match (map.get_mut(&key), value) {
                    (Some(Value::Array(items)), Value::Array(more)) => items.extend(more),
                    (_, value) => {
                        map.insert(key, value);
                    }
                }
            }
        }
        (acc, next) => *acc = next,
    }
}

/// Records in this page, for the got-a-full-page stop condition. For object
/// payloads that is the longest array value, the shape every Central list
/// endpoint uses.
fn page_item_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => {
            map.values().filter_map(Value::as_array).map(Vec::len).max().unwrap_or(0)
        }
        _ => 0,
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let get = |name: &str| -> Option<u32> {
        headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| s.trim().parse().ok())
    };

    let limit_day = get("X-RateLimit-Limit-day");
    let remaining_day = get("X-RateLimit-Remaining-day");
    let limit_sec = get("X-RateLimit-Limit-second");
    let remaining_sec = get("X-RateLimit-Remaining-second");

    if [limit_day, remaining_day, limit_sec, remaining_sec].iter().all(Option::is_none) {
        return None;
    }
    Some(RateLimitInfo {
        limit_day: limit_day.unwrap_or(0),
        remaining_day: remaining_day.unwrap_or(0),
        limit_sec: limit_sec.unwrap_or(0),
        remaining_sec: remaining_sec.unwrap_or(0),
    })
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
