//! Ports for token refresh and token persistence.
//!
//! These traits abstract the OAuth endpoint and the on-disk token cache so
//! the token manager can be tested with mock implementations.

use async_trait::async_trait;
use centralkit_domain::{Result, TokenSet};

/// Exchanges a refresh token for a new token pair at the provider.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Perform the refresh-token grant.
    ///
    /// # Errors
    /// Returns `CentralError::Auth` if the provider rejects the refresh
    /// token, `CentralError::Network` on transport failure.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet>;
}

/// Persists the current token pair between process runs.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored token pair, or `Ok(None)` when none exists yet.
    async fn load(&self) -> Result<Option<TokenSet>>;

    /// Replace the stored token pair. Called after every successful refresh,
    /// before the refreshed token is used.
    async fn save(&self, tokens: &TokenSet) -> Result<()>;
}
