//! Persistence adapters: sqlite cache tables and the JSON token file.

mod sqlite;
mod token_file;

pub use sqlite::SqliteCacheStore;
pub use token_file::FileTokenStore;
