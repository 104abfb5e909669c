//! OAuth token material and account identity.
//!
//! A [`TokenSet`] is owned by the core token manager and persisted through
//! the `TokenStore` port after every mutation, so a subsequent process run
//! reuses it instead of forcing a fresh OAuth exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth access/refresh token pair with expiry metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token presented on every API call
    pub access_token: String,

    /// Refresh token used to mint a new access token without user interaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds, as reported by the token endpoint
    pub expires_in: i64,

    /// Absolute expiration timestamp (UTC), calculated at creation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a new `TokenSet` with `expires_at` derived from `expires_in`.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self { access_token, refresh_token, expires_in, expires_at }
    }

    /// Whether the access token is expired or will expire within
    /// `threshold_seconds`. Tokens without an expiry are assumed valid.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at
            }
            None => false,
        }
    }

    /// Seconds until expiry, or `None` if no expiry is set.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// Token response from the provider's `/oauth2/token` endpoint (RFC 6749).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self::new(response.access_token, response.refresh_token, response.expires_in)
    }
}

/// Account-scoped identity needed to talk to one Central cluster.
///
/// Supplied by the external credential source (config file, env). Only the
/// token manager uses `client_id`/`client_secret`; everything else needs just
/// `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// API gateway base URL, e.g. `https://apigw-uswest4.central.arubanetworks.com`
    pub base_url: String,
    pub customer_id: String,
    pub client_id: String,
    pub client_secret: String,
}
