//! Refresh-token grant against Central's `/oauth2/token` endpoint.

use async_trait::async_trait;
use centralkit_core::AuthClient;
use centralkit_domain::{Account, CentralError, Result, TokenResponse, TokenSet};
use tracing::debug;

/// [`AuthClient`] adapter for Central's OAuth gateway.
///
/// Central takes the refresh grant as query parameters on a bodyless POST.
pub struct CentralAuthClient {
    http: reqwest::Client,
    account: Account,
}

impl CentralAuthClient {
    /// # Errors
    /// `CentralError::Config` when the TLS backend cannot initialize.
    pub fn new(account: Account) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CentralError::Config(format!("http client init failed: {e}")))?;
        Ok(Self { http, account })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.account.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AuthClient for CentralAuthClient {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenSet> {
        debug!(customer_id = %self.account.customer_id, "refreshing access token");

        let response = self
            .http
            .post(self.token_url())
            .query(&[
                ("client_id", self.account.client_id.as_str()),
                ("client_secret", self.account.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| CentralError::Network(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CentralError::Auth(format!(
                "token refresh rejected ({status}): {text}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CentralError::Decode(format!("token response: {e}")))?;
        Ok(token.into())
    }
}
