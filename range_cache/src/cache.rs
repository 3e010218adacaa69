use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::chunk::Chunk;
use crate::config::CacheConfig;
use crate::error::RangeCacheError;
use crate::pool::ChunkPool;

/// Resident chunks keyed by their aligned start offset. Ordered so the smallest offset is
/// always the first to go when the cache is full.
type CacheState = BTreeMap<u64, Arc<Chunk>>;

/// Counters describing how a [`RangeCache`] has been used since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub failed_fetches: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    failed_fetches: AtomicU64,
}

/// RangeCache is a bounded, chunk-granular read cache in front of a slow range-readable source.
///
/// Reads are split on `chunk_size` boundaries. Each chunk is served from memory when resident,
/// otherwise it is fetched through the caller's fetch function and kept for later reads. Once
/// the resident set reaches `max_cache_size / chunk_size` chunks, inserting a new chunk first
/// evicts resident chunks in ascending offset order.
///
/// The fetch function always runs without any internal lock held. Concurrent misses on the
/// same chunk are not coalesced: each fetches and inserts, and the last insertion wins.
#[derive(Debug)]
pub struct RangeCache {
    config: CacheConfig,
    chunk_len: usize,
    capacity: usize,
    state: Mutex<CacheState>,
    pool: ChunkPool,
    stats: StatCounters,
}

impl RangeCache {
    pub fn new(config: CacheConfig) -> Result<Self, RangeCacheError> {
        config.validate()?;
        let chunk_len =
            usize::try_from(config.chunk_size).map_err(|_| RangeCacheError::ChunkSizeTooLarge(config.chunk_size))?;

        Ok(Self {
            config,
            chunk_len,
            capacity: config.capacity(),
            state: Mutex::new(CacheState::new()),
            pool: ChunkPool::new(chunk_len, config.max_pooled_chunks),
            stats: StatCounters::default(),
        })
    }

    /// Builds a cache sized from the environment, see [`CacheConfig::default`].
    pub fn with_defaults() -> Result<Self, RangeCacheError> {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn chunk_size(&self) -> u64 {
        self.config.chunk_size
    }

    /// Maximum number of resident chunks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_chunks(&self) -> usize {
        self.state.lock().len()
    }

    pub fn resident_bytes(&self) -> u64 {
        self.num_chunks() as u64 * self.config.chunk_size
    }

    /// Whether the chunk covering `offset` is resident.
    pub fn contains(&self, offset: u64) -> bool {
        self.state.lock().contains_key(&self.align(offset))
    }

    /// The resident chunk covering `offset`, if any. Never fetches and does not count as a hit.
    pub fn get(&self, offset: u64) -> Option<Arc<Chunk>> {
        self.lookup(self.align(offset))
    }

    /// Start offsets of all resident chunks, ascending.
    pub fn resident_offsets(&self) -> Vec<u64> {
        self.state.lock().keys().copied().collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            failed_fetches: self.stats.failed_fetches.load(Ordering::Relaxed),
        }
    }

    fn align(&self, offset: u64) -> u64 {
        (offset / self.config.chunk_size) * self.config.chunk_size
    }

    fn lookup(&self, chunk_start: u64) -> Option<Arc<Chunk>> {
        self.state.lock().get(&chunk_start).cloned()
    }

    /// Fill `dest` with the source bytes `[start, start + dest.len())`.
    ///
    /// Chunks that are not resident are retrieved with `fetch(chunk_start, buf)`, which must
    /// fill `buf` (always exactly `chunk_size` bytes) with the source bytes starting at the
    /// chunk-aligned offset `chunk_start`. The first fetch error aborts the read and is
    /// returned as is; the chunk that failed is not cached. `dest` contents are unspecified
    /// after a failed read. Bytes of `dest` that would lie past `u64::MAX` are left untouched.
    pub fn read<E, F>(&self, mut start: u64, mut dest: &mut [u8], mut fetch: F) -> Result<(), E>
    where
        F: FnMut(u64, &mut [u8]) -> Result<(), E>,
    {
        while !dest.is_empty() {
            let chunk_start = self.align(start);

            let bytes_read = match self.lookup(chunk_start) {
                Some(chunk) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    chunk.read(start, dest)
                },
                None => {
                    // A single read misses on at most one chunk at a time, so at most one
                    // pooled buffer is outstanding per reader.
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    trace!(chunk_start, "range cache miss, fetching chunk");

                    let mut buf = self.pool.acquire();
                    if let Err(e) = fetch(chunk_start, &mut buf) {
                        self.stats.failed_fetches.fetch_add(1, Ordering::Relaxed);
                        self.pool.release(buf);
                        return Err(e);
                    }

                    let chunk = Arc::new(Chunk::new(chunk_start, buf));
                    self.put(chunk.clone());
                    chunk.read(start, dest)
                },
            };

            dest = &mut dest[bytes_read..];
            if dest.is_empty() {
                break;
            }
            // Nothing is addressable past the last chunk of the u64 space.
            let Some(next) = chunk_start.checked_add(self.config.chunk_size) else {
                break;
            };
            start = next;
        }

        Ok(())
    }

    fn put(&self, chunk: Arc<Chunk>) {
        debug_assert_eq!(chunk.len(), self.chunk_len);
        debug_assert_eq!(chunk.start() % self.config.chunk_size, 0);

        let mut state = self.state.lock();

        if state.len() >= self.capacity {
            let evicted = self.evict(&mut state, self.capacity.saturating_sub(1));
            debug!(
                evicted,
                resident = state.len(),
                inserting = chunk.start(),
                "range cache full, evicted lowest offsets"
            );
        }

        if let Some(replaced) = state.insert(chunk.start(), chunk) {
            self.recycle(replaced);
        }
    }

    /// Drop every resident chunk.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let evicted = self.evict(&mut state, 0);
        debug!(evicted, "range cache cleared");
    }

    /// Remove chunks in ascending offset order until at most `keep` remain.
    fn evict(&self, state: &mut CacheState, keep: usize) -> usize {
        let mut evicted = 0;
        while state.len() > keep {
            let Some((_, chunk)) = state.pop_first() else {
                break;
            };
            self.recycle(chunk);
            evicted += 1;
        }
        self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Hand the chunk's buffer back to the pool, unless a reader still holds the chunk.
    fn recycle(&self, chunk: Arc<Chunk>) {
        if let Ok(chunk) = Arc::try_unwrap(chunk) {
            self.pool.release(chunk.into_data());
        }
    }

    /// Number of retired chunk buffers waiting to be reused.
    pub fn pooled_buffers(&self) -> usize {
        self.pool.len()
    }
}
