//! Adapters behind the core ports.
//!
//! - [`http`] — reqwest-backed request engine and OAuth refresh client
//! - [`api`] — Central endpoint listings feeding the identifier cache
//! - [`store`] — sqlite cache tables and the JSON token file
//! - [`config`] — TOML account configuration with env overrides

pub mod api;
pub mod config;
pub mod http;
pub mod store;

pub use api::CentralApi;
pub use config::AppConfig;
pub use http::{CentralAuthClient, RequestEngine, RequestEngineBuilder};
pub use store::{FileTokenStore, SqliteCacheStore};
