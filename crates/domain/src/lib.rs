//! Plain data types shared across the centralkit crates.
//!
//! Everything here is serde-serializable structured data: API call
//! descriptors and results, OAuth token material, and the cached inventory
//! records the identifier resolver works on. No I/O lives in this crate.

pub mod errors;
pub mod types;
pub mod utils;

pub use errors::{CentralError, Result};
pub use types::cache::{
    CacheEntry, CacheKind, CachedClient, CachedDevice, CachedGroup, CachedLabel, CachedSite,
    CachedTemplate, ClientType, DeviceType, Resolution,
};
pub use types::request::{
    CallDescriptor, CallResult, Method, Page, Payload, RateLimitInfo, STATUS_TRANSPORT_FAILURE,
};
pub use types::token::{Account, TokenResponse, TokenSet};
