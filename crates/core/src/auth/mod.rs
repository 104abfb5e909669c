//! OAuth token lifecycle management.

mod token_manager;
mod traits;

pub use token_manager::TokenManager;
pub use traits::{AuthClient, TokenStore};
