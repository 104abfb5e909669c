//! Account configuration loader.
//!
//! Loads the account identity and storage paths from a TOML file, with
//! environment variables overriding individual fields.
//!
//! ## Environment Variables
//! - `CENTRAL_BASE_URL`: API gateway base URL
//! - `CENTRAL_CUSTOMER_ID`: Central customer id
//! - `CENTRAL_CLIENT_ID` / `CENTRAL_CLIENT_SECRET`: OAuth client credentials
//! - `CENTRAL_CACHE_DB`: cache database path
//! - `CENTRAL_TOKEN_FILE`: token file path

use std::path::{Path, PathBuf};

use centralkit_domain::{Account, CentralError, Result, TokenSet};
use serde::Deserialize;
use tracing::{debug, info};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub account: Account,
    /// Token pair supplied inline, used when no token file exists yet.
    pub token: Option<TokenSet>,
    /// Cache database path; defaults to `central-cache.db` beside the config.
    #[serde(default)]
    pub cache_db: Option<PathBuf>,
    /// Token file path; defaults to `tokens.json` beside the config.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `path`, then apply env overrides.
    ///
    /// # Errors
    /// `CentralError::Config` when the file is unreadable or not valid TOML,
    /// or when a required account field ends up empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CentralError::Config(format!("reading config {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| {
            CentralError::Config(format!("parsing config {}: {e}", path.display()))
        })?;

        config.apply_env();
        config.default_paths(path.parent().unwrap_or_else(|| Path::new(".")));
        config.validate()?;

        info!(path = %path.display(), customer_id = %config.account.customer_id, "config loaded");
        Ok(config)
    }

    fn apply_env(&mut self) {
        let mut overridden = false;
        let mut take = |name: &str, slot: &mut String| {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *slot = value;
                    overridden = true;
                }
            }
        };
        take("CENTRAL_BASE_URL", &mut self.account.base_url);
        take("CENTRAL_CUSTOMER_ID", &mut self.account.customer_id);
        take("CENTRAL_CLIENT_ID", &mut self.account.client_id);
        take("CENTRAL_CLIENT_SECRET", &mut self.account.client_secret);

        if let Ok(value) = std::env::var("CENTRAL_CACHE_DB") {
            self.cache_db = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var("CENTRAL_TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(value));
        }
        if overridden {
            debug!("account fields overridden from environment");
        }
    }

    fn default_paths(&mut self, config_dir: &Path) {
        if self.cache_db.is_none() {
            self.cache_db = Some(config_dir.join("central-cache.db"));
        }
        if self.token_file.is_none() {
            self.token_file = Some(config_dir.join("tokens.json"));
        }
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("account.base_url", &self.account.base_url),
            ("account.customer_id", &self.account.customer_id),
            ("account.client_id", &self.account.client_id),
            ("account.client_secret", &self.account.client_secret),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CentralError::Config(format!("missing required field {field}")));
            }
        }
        Ok(())
    }

    /// Cache database path, defaulted during load.
    #[must_use]
    pub fn cache_db_path(&self) -> &Path {
        self.cache_db.as_deref().unwrap_or_else(|| Path::new("central-cache.db"))
    }

    /// Token file path, defaulted during load.
    #[must_use]
    pub fn token_file_path(&self) -> &Path {
        self.token_file.as_deref().unwrap_or_else(|| Path::new("tokens.json"))
    }
}
