// src/trends/mod.rs
//! Trending topics: provider abstraction, credential rotation, snapshot cache.

pub mod cache;
pub mod rotation;
pub mod serpapi;
pub mod types;

pub use cache::{CacheState, CacheStatus, TrendsCache};
pub use rotation::{classify, Credentials, ErrorClass, KeyRotationProvider, TrendsError};
pub use types::{CredentialSlot, TrendingTopic, TrendsRequest, TrendsSnapshot, TrendsSource};
