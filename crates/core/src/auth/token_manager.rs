//! Token manager with serialized refresh.
//!
//! Manages the OAuth token lifecycle:
//! - hydration from the token store at startup
//! - proactive refresh when the token is within the expiry threshold
//! - single-flight refresh after a 401: concurrent callers that observe an
//!   invalid token while a refresh is already in progress wait for that
//!   refresh's outcome instead of starting their own

use std::sync::Arc;

use centralkit_domain::{CentralError, Result, TokenSet};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Seconds before expiry at which the access token is refreshed proactively.
const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

/// Thread-safe owner of the current [`TokenSet`].
///
/// All request-engine calls obtain their bearer credential here; the token
/// pair is persisted through the [`TokenStore`] port after every mutation so
/// the next process run reuses it.
///
/// [`TokenStore`]: super::TokenStore
pub struct TokenManager {
    auth_client: Arc<dyn super::AuthClient>,
    store: Arc<dyn super::TokenStore>,
    current: RwLock<Option<TokenSet>>,
    /// Serializes refresh attempts. Held across the provider round-trip so
    /// concurrent 401s collapse into one refresh call.
    refresh_gate: Mutex<()>,
    refresh_threshold_secs: i64,
}

impl TokenManager {
    #[must_use]
    pub fn new(auth_client: Arc<dyn super::AuthClient>, store: Arc<dyn super::TokenStore>) -> Self {
        Self {
            auth_client,
            store,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
        }
    }

    #[must_use]
    pub fn with_refresh_threshold(mut self, seconds: i64) -> Self {
        self.refresh_threshold_secs = seconds;
        self
    }

    /// Load tokens from the store into memory. Call once at startup.
    ///
    /// Returns `true` when a stored token pair was found.
    ///
    /// # Errors
    /// Returns error only if the store itself fails; an absent token is fine.
    pub async fn initialize(&self) -> Result<bool> {
        match self.store.load().await? {
            Some(tokens) => {
                *self.current.write().await = Some(tokens);
                info!("token manager initialized from stored tokens");
                Ok(true)
            }
            None => {
                debug!("no stored tokens found");
                Ok(false)
            }
        }
    }

    /// Install tokens obtained out-of-band (initial auth, config import).
    ///
    /// # Errors
    /// Returns error if persisting through the store fails.
    pub async fn install_tokens(&self, tokens: TokenSet) -> Result<()> {
        self.store.save(&tokens).await?;
        *self.current.write().await = Some(tokens);
        Ok(())
    }

    /// Current token pair, without triggering a refresh.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.current.read().await.clone()
    }

    /// Valid access token, refreshing first when the current one is within
    /// the expiry threshold.
    ///
    /// # Errors
    /// `CentralError::Auth` when not authenticated or refresh fails.
    pub async fn access_token(&self) -> Result<String> {
        let stale = {
            let guard = self.current.read().await;
            match guard.as_ref() {
                Some(t) if t.is_expired(self.refresh_threshold_secs) => Some(t.access_token.clone()),
                Some(t) => return Ok(t.access_token.clone()),
                None => None,
            }
        };

        match stale {
            Some(stale_token) => self.refresh_after_rejection(&stale_token).await,
            None => Err(CentralError::Auth("not authenticated (no tokens)".to_string())),
        }
    }

    /// Refresh the token pair after `rejected_token` was refused by the API.
    ///
    /// Single-flight: the refresh gate is held across the provider call, and
    /// a caller that acquires the gate after another caller already replaced
    /// the token simply returns the new token. N concurrent 401s therefore
    /// produce exactly one provider refresh call.
    ///
    /// # Errors
    /// `CentralError::Auth` when no refresh token exists or the provider
    /// rejects it — at that point only out-of-band re-authentication helps.
    pub async fn refresh_after_rejection(&self, rejected_token: &str) -> Result<String> {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let guard = self.current.read().await;
            let tokens = guard
                .as_ref()
                .ok_or_else(|| CentralError::Auth("not authenticated (no tokens)".to_string()))?;

            if tokens.access_token != rejected_token {
                // Another caller refreshed while we waited on the gate.
                debug!("token already refreshed by concurrent caller");
                return Ok(tokens.access_token.clone());
            }

            tokens
                .refresh_token
                .clone()
                .ok_or_else(|| CentralError::Auth("no refresh token available".to_string()))?
        };

        let new_tokens = match self.auth_client.refresh_access_token(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "token refresh failed, re-authentication required");
                return Err(e);
            }
        };

        // Persist before handing the new token out, so a crash between
        // refresh and save cannot strand a token only this process knew.
        self.store.save(&new_tokens).await?;
        let access = new_tokens.access_token.clone();
        *self.current.write().await = Some(new_tokens);
        info!("access token refreshed");

        Ok(access)
    }
}
