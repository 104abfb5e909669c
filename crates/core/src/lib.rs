//! Services and ports for the centralkit client core.
//!
//! Network- and disk-free: every external effect goes through an injected
//! trait object. Infra adapters (reqwest engine, sqlite store, token file)
//! live in `centralkit-infra`.
//!
//! - [`auth`] — token lifecycle: threshold refresh, serialized 401 recovery
//! - [`batch`] — bounded-concurrency dispatch with rate-limit backoff
//! - [`cache`] — fuzzy identifier resolution over swap-on-refresh tables

pub mod auth;
pub mod batch;
pub mod cache;

pub use auth::{AuthClient, TokenManager, TokenStore};
pub use batch::{ApiExecutor, BatchConfig, BatchDispatcher, RateLimitState};
pub use cache::{CacheStore, IdentifierCache, InventorySource};
