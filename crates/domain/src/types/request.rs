//! Call descriptors and normalized call results.
//!
//! [`CallResult`] is the single outcome type every caller sees regardless of
//! whether a failure happened at the transport, HTTP, or decode layer. It is
//! plain structured data: named fields plus an explicit [`CallResult::get`]
//! accessor for dynamic payload keys.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel status for failures that never produced an HTTP response
/// (connection refused, DNS, timeout, request build). Zero can never come
/// off the wire, so callers can always tell it apart from a real status.
pub const STATUS_TRANSPORT_FAILURE: u16 = 0;

/// HTTP method of a call. Mirrors the subset the Central API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offset/limit pagination parameters for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Maximum records per page; the provider caps this per endpoint.
    pub limit: usize,
    /// Starting record index for the first page.
    pub offset: usize,
}

impl Page {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// One logical API operation: everything the request engine needs to build
/// the HTTP request. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub method: Method,
    /// Path relative to the account's base URL, e.g. `/central/v2/sites`.
    pub path: String,
    /// Query parameters other than the pagination pair.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    /// JSON request body, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// When set, the engine collects every page before returning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

impl CallDescriptor {
    /// GET descriptor with no query, body, or pagination.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), query: BTreeMap::new(), body: None, page: None }
    }

    /// Descriptor with an explicit method and JSON body.
    #[must_use]
    pub fn with_body(method: Method, path: impl Into<String>, body: Value) -> Self {
        Self { method, path: path.into(), query: BTreeMap::new(), body: Some(body), page: None }
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn paged(mut self, limit: usize) -> Self {
        self.page = Some(Page::new(limit));
        self
    }
}

/// Response body in whatever shape the provider returned it.
///
/// Decode failures keep the raw text so callers can still inspect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Payload {
    Json(Value),
    Text(String),
    Empty,
}

impl Payload {
    /// JSON value if this payload decoded as JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Number of items: array length, object key count, 0 for empty,
    /// 1 for anything else. Used by the pagination loop to decide whether
    /// the provider has more pages.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Json(Value::Array(items)) => items.len(),
            Self::Json(Value::Object(map)) => map.len(),
            Self::Json(Value::Null) | Self::Empty => 0,
            Self::Json(_) | Self::Text(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Provider rate-limit budget, parsed from response headers.
///
/// Central reports both a daily and a per-second window:
/// `X-RateLimit-Limit-day` / `X-RateLimit-Remaining-day` and
/// `X-RateLimit-Limit-second` / `X-RateLimit-Remaining-second`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit_day: u32,
    pub remaining_day: u32,
    pub limit_sec: u32,
    pub remaining_sec: u32,
}

impl RateLimitInfo {
    /// Whether the per-second window is close enough to exhaustion that the
    /// dispatcher should slow down before the provider starts returning 429s.
    #[must_use]
    pub fn near_limit(&self) -> bool {
        self.limit_sec > 0 && self.remaining_sec <= 1
    }
}

/// Normalized outcome of one logical call.
///
/// Invariant: `ok` is true iff `status` is in the 2xx range AND the body
/// decoded AND (if the descriptor was paginated) every page was collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub ok: bool,
    /// Real HTTP status, or [`STATUS_TRANSPORT_FAILURE`].
    pub status: u16,
    pub output: Payload,
    /// Human-readable failure description; `None` on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent on the wire, all pages and retries included.
    pub elapsed: Duration,
    /// Rate-limit budget from the last response's headers, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
    /// `Retry-After` delay from a 429 response, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl CallResult {
    /// Successful result wrapping a decoded payload.
    #[must_use]
    pub fn success(status: u16, output: Payload, elapsed: Duration) -> Self {
        Self { ok: true, status, output, error: None, elapsed, rate_limit: None, retry_after: None }
    }

    /// Failed result with a provider status and its error text verbatim.
    #[must_use]
    pub fn failure(status: u16, output: Payload, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            ok: false,
            status,
            output,
            error: Some(error.into()),
            elapsed,
            rate_limit: None,
            retry_after: None,
        }
    }

    /// Failure that never reached the HTTP layer.
    #[must_use]
    pub fn transport_failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self::failure(STATUS_TRANSPORT_FAILURE, Payload::Empty, error, elapsed)
    }

    /// Whether the provider signalled rate limiting for this call: a 429,
    /// or any failure carrying a `Retry-After` delay.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        !self.ok && (self.status == 429 || self.retry_after.is_some())
    }

    /// Dynamic accessor for a top-level key of a JSON object payload.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.output.as_json().and_then(|value| value.get(key))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::request.
    use serde_json::json;

    use super::*;

    #[test]
    fn descriptor_builder_sets_query_and_paging() {
        let desc = CallDescriptor::get("/central/v2/sites")
            .query("calculate_total", "false")
            .paged(1000);

        assert_eq!(desc.method, Method::Get);
        assert_eq!(desc.query.get("calculate_total").map(String::as_str), Some("false"));
        assert_eq!(desc.page, Some(Page { limit: 1000, offset: 0 }));
    }

    #[test]
    fn payload_len_counts_items() {
        assert_eq!(Payload::Json(json!([1, 2, 3])).len(), 3);
        assert_eq!(Payload::Json(json!({"a": 1, "b": 2})).len(), 2);
        assert_eq!(Payload::Empty.len(), 0);
        assert_eq!(Payload::Text("raw".to_string()).len(), 1);
    }

    #[test]
    fn transport_failure_uses_sentinel_status() {
        let result = CallResult::transport_failure("connection refused", Duration::ZERO);

        assert!(!result.ok);
        assert_eq!(result.status, STATUS_TRANSPORT_FAILURE);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn get_reads_top_level_payload_keys() {
        let result = CallResult::success(
            200,
            Payload::Json(json!({"total": 4, "sites": []})),
            Duration::ZERO,
        );

        assert_eq!(result.get("total"), Some(&json!(4)));
        assert!(result.get("missing").is_none());
    }

    #[test]
    fn rate_limit_near_limit_needs_reported_window() {
        let exhausted =
            RateLimitInfo { limit_day: 5000, remaining_day: 100, limit_sec: 7, remaining_sec: 1 };
        assert!(exhausted.near_limit());

        // Header absent: all zeros, not treated as exhaustion.
        assert!(!RateLimitInfo::default().near_limit());
    }
}
