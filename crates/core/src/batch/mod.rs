//! Concurrent dispatch of independent API calls.

mod dispatcher;
mod ports;

pub use dispatcher::{BatchConfig, BatchDispatcher, RateLimitState};
pub use ports::ApiExecutor;
