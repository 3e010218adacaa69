mod cache;
mod chunk;
pub mod config;
pub mod error;
mod pool;
pub mod test_utils;

pub use cache::{CacheStats, RangeCache};
pub use chunk::Chunk;
pub use config::CacheConfig;
pub use error::RangeCacheError;
