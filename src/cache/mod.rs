//! Response caching.
//!
//! - [`fingerprint`]: order- and whitespace-insensitive content keys, plus
//!   the edit-distance similarity used for fuzzy matching
//! - [`response::ResponseCache`]: bounded LRU store of model responses with
//!   exact-then-fuzzy lookup and hit/miss accounting

pub mod fingerprint;
pub mod response;

pub use fingerprint::{fingerprint, levenshtein, normalize, similarity};
pub use response::{
    CacheConfig, CacheEntrySummary, CacheMetadata, CacheStats, CachedResponse, ResponseCache,
};
