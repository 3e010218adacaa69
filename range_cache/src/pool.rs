use parking_lot::Mutex;

/// A bounded reservoir of chunk-sized buffers.
///
/// Evicted chunks hand their buffers back here so that the next cache miss can reuse the
/// allocation. Reused buffers are zeroed before they are handed out, so bytes a short fetch
/// does not overwrite never leak from a previous chunk.
#[derive(Debug)]
pub(crate) struct ChunkPool {
    chunk_len: usize,
    max_buffers: usize,
    buffers: Mutex<Vec<Box<[u8]>>>,
}

impl ChunkPool {
    pub(crate) fn new(chunk_len: usize, max_buffers: usize) -> Self {
        Self {
            chunk_len,
            max_buffers,
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn acquire(&self) -> Box<[u8]> {
        let reused = self.buffers.lock().pop();
        match reused {
            Some(mut buf) => {
                buf.fill(0);
                buf
            },
            None => vec![0u8; self.chunk_len].into_boxed_slice(),
        }
    }

    /// Keep `buf` for reuse, or drop it if the pool is full or it is not chunk sized.
    pub(crate) fn release(&self, buf: Box<[u8]>) {
        if buf.len() != self.chunk_len {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_buffers {
            buffers.push(buf);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buffers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkPool;

    #[test]
    fn test_acquire_allocates_chunk_len() {
        let pool = ChunkPool::new(16, 2);
        let buf = pool.acquire();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_release_then_acquire_reuses_zeroed() {
        let pool = ChunkPool::new(8, 2);
        let mut buf = pool.acquire();
        buf.fill(0xab);
        let ptr = buf.as_ptr();
        pool.release(buf);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire();
        assert_eq!(reused.as_ptr(), ptr);
        assert!(reused.iter().all(|&b| b == 0));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_release_is_bounded() {
        let pool = ChunkPool::new(4, 2);
        pool.release(pool.acquire());
        pool.release(pool.acquire());
        assert_eq!(pool.len(), 1);

        let a = vec![0u8; 4].into_boxed_slice();
        let b = vec![0u8; 4].into_boxed_slice();
        pool.release(a);
        assert_eq!(pool.len(), 2);
        pool.release(b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_release_rejects_wrong_len() {
        let pool = ChunkPool::new(4, 2);
        pool.release(vec![0u8; 3].into_boxed_slice());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_zero_sized_pool_never_keeps() {
        let pool = ChunkPool::new(4, 0);
        pool.release(pool.acquire());
        assert_eq!(pool.len(), 0);
    }
}
