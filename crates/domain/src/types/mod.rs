//! Core data model: tokens, call descriptors/results, cached inventory.

pub mod cache;
pub mod request;
pub mod token;
