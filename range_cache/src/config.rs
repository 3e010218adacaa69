use lazy_static::lazy_static;
use tracing::{debug, info, warn};

use crate::error::RangeCacheError;

/// 4 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 << 20;
/// 1 GiB.
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 1 << 30;
pub const DEFAULT_MAX_POOLED_CHUNKS: usize = 16;

/// A cache setting that can be read from a `RANGE_CACHE_*` environment variable.
pub trait ParsableConfigValue: std::fmt::Debug + Sized {
    fn parse_user_value(value: &str) -> Option<Self>;

    /// Resolve a setting: the user's value when it parses, otherwise `default` (with a warning
    /// for a value that was set but is malformed).
    fn parse(variable_name: &str, value: Option<String>, default: Self) -> Self {
        match value {
            Some(v) => match Self::parse_user_value(&v) {
                Some(v) => {
                    info!("Config: {variable_name} = {v:?} (user set)");
                    v
                },
                None => {
                    warn!(
                        "Configuration value {v} for {variable_name} cannot be parsed into correct type; reverting to default."
                    );
                    info!("Config: {variable_name} = {default:?} (default due to parse error)");
                    default
                },
            },
            None => {
                debug!("Config: {variable_name} = {default:?} (default)");
                default
            },
        }
    }
}

/// Byte counts accept a plain integer or an integer followed by a unit,
/// e.g. "4096", "4mib", "1 GB".
impl ParsableConfigValue for u64 {
    fn parse_user_value(value: &str) -> Option<Self> {
        parse_byte_size(value)
    }
}

impl ParsableConfigValue for usize {
    fn parse_user_value(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }
}

fn parse_byte_size(value: &str) -> Option<u64> {
    let value = value.trim().to_ascii_lowercase();
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let count: u64 = digits.parse().ok()?;

    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1_000,
        "kib" | "k" => 1 << 10,
        "mb" => 1_000_000,
        "mib" | "m" => 1 << 20,
        "gb" => 1_000_000_000,
        "gib" | "g" => 1 << 30,
        "tb" => 1_000_000_000_000,
        "tib" | "t" => 1 << 40,
        _ => return None,
    };
    count.checked_mul(multiplier)
}

fn from_env<T: ParsableConfigValue>(variable_name: &str, default: T) -> T {
    T::parse(variable_name, std::env::var(variable_name).ok(), default)
}

lazy_static! {
    /// Bytes per cached chunk.
    ///
    /// Use the environment variable `RANGE_CACHE_CHUNK_SIZE` to set this value.
    pub static ref CHUNK_SIZE: u64 = from_env("RANGE_CACHE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE);

    /// Total number of bytes the cache keeps resident.
    ///
    /// Use the environment variable `RANGE_CACHE_MAX_CACHE_SIZE` to set this value.
    pub static ref MAX_CACHE_SIZE: u64 = from_env("RANGE_CACHE_MAX_CACHE_SIZE", DEFAULT_MAX_CACHE_SIZE);

    /// Number of evicted chunk buffers kept around for reuse.
    ///
    /// Use the environment variable `RANGE_CACHE_MAX_POOLED_CHUNKS` to set this value.
    pub static ref MAX_POOLED_CHUNKS: usize =
        from_env("RANGE_CACHE_MAX_POOLED_CHUNKS", DEFAULT_MAX_POOLED_CHUNKS);
}

/// Sizing of a [`RangeCache`](crate::RangeCache); fixed for the lifetime of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheConfig {
    /// Bytes per chunk; every fetch is for exactly this many bytes at a multiple of it.
    pub chunk_size: u64,
    /// Resident byte budget. The cache holds at most `max_cache_size / chunk_size` chunks.
    pub max_cache_size: u64,
    pub max_pooled_chunks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        // Load the defaults from the environment.
        Self {
            chunk_size: *CHUNK_SIZE,
            max_cache_size: *MAX_CACHE_SIZE,
            max_pooled_chunks: *MAX_POOLED_CHUNKS,
        }
    }
}

impl CacheConfig {
    pub fn new(chunk_size: u64, max_cache_size: u64) -> Self {
        Self {
            chunk_size,
            max_cache_size,
            max_pooled_chunks: DEFAULT_MAX_POOLED_CHUNKS,
        }
    }

    pub fn with_max_pooled_chunks(self, max_pooled_chunks: usize) -> Self {
        Self {
            max_pooled_chunks,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), RangeCacheError> {
        if self.chunk_size == 0 {
            return Err(RangeCacheError::ZeroChunkSize);
        }
        if usize::try_from(self.chunk_size).is_err() {
            return Err(RangeCacheError::ChunkSizeTooLarge(self.chunk_size));
        }
        if self.max_cache_size < self.chunk_size {
            return Err(RangeCacheError::BudgetBelowChunkSize {
                chunk_size: self.chunk_size,
                max_cache_size: self.max_cache_size,
            });
        }
        Ok(())
    }

    /// Maximum number of resident chunks.
    pub fn capacity(&self) -> usize {
        usize::try_from(self.max_cache_size / self.chunk_size.max(1)).unwrap_or(usize::MAX)
    }
}
