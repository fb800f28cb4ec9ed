//! Response caching: exact tier + semantic tier behind one contract.

mod exact;
mod response_cache;

pub use exact::{normalize_query, EvictionPolicy, ExactCache};
pub use response_cache::{CacheLookup, ResponseCache, DEFAULT_SIMILARITY_THRESHOLD};
