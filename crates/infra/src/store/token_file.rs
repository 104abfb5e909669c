//! JSON token file with atomic replace-on-save.

use std::path::PathBuf;

use async_trait::async_trait;
use centralkit_core::TokenStore;
use centralkit_domain::{CentralError, Result, TokenSet};
use tokio::fs;
use tracing::debug;

/// [`TokenStore`] keeping the newest token pair in one JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-write can never leave a truncated token file behind.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenSet>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CentralError::Config(format!(
                    "reading token file {}: {e}",
                    self.path.display()
                )))
            }
        };

        let tokens = serde_json::from_slice(&raw).map_err(|e| {
            CentralError::Decode(format!("token file {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "tokens loaded from file");
        Ok(Some(tokens))
    }

    async fn save(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CentralError::Config(format!("creating {}: {e}", parent.display()))
            })?;
        }

        let raw = serde_json::to_vec_pretty(tokens)
            .map_err(|e| CentralError::Internal(format!("serializing tokens: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &raw).await.map_err(|e| {
            CentralError::Config(format!("writing token file {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            CentralError::Config(format!("replacing token file {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), "tokens persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for store::token_file.
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        let tokens = TokenSet::new("access".to_string(), Some("refresh".to_string()), 7200);

        store.save(&tokens).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn save_replaces_previous_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));

        store.save(&TokenSet::new("first".to_string(), None, 7200)).await.unwrap();
        store.save(&TokenSet::new("second".to_string(), None, 7200)).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "second");
    }

    #[tokio::test]
    async fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/dir/tokens.json"));

        store.save(&TokenSet::new("access".to_string(), None, 7200)).await.unwrap();
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileTokenStore::new(path);
        assert!(matches!(store.load().await, Err(CentralError::Decode(_))));
    }
}
