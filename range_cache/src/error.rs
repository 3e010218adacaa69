use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeCacheError {
    #[error("chunk size must be non-zero")]
    ZeroChunkSize,
    #[error("chunk size {0} cannot be addressed as an in-memory buffer")]
    ChunkSizeTooLarge(u64),
    #[error("cache size {max_cache_size} is smaller than one chunk of {chunk_size} bytes")]
    BudgetBelowChunkSize { chunk_size: u64, max_cache_size: u64 },
}
