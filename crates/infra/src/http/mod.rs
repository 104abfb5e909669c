//! HTTP adapters: the request engine and the OAuth refresh client.

mod engine;
mod oauth;

pub use engine::{RequestEngine, RequestEngineBuilder};
pub use oauth::CentralAuthClient;
