use more_asserts::{debug_assert_le, debug_assert_lt};

/// A fixed-size run of source bytes starting at a chunk-aligned offset.
///
/// The buffer always holds exactly one chunk worth of bytes, covering
/// `[start, start + len)` of the source. Once inserted into a
/// [`RangeCache`](crate::RangeCache) a chunk is never written to again.
#[derive(Debug)]
pub struct Chunk {
    start: u64,
    data: Box<[u8]>,
}

impl Chunk {
    pub(crate) fn new(start: u64, data: Box<[u8]>) -> Self {
        Self { start, data }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Exclusive end offset of the bytes this chunk covers, saturating at `u64::MAX` for the
    /// last chunk of the address space.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.data.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset - self.start < self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy bytes starting at absolute offset `start` into `dest`.
    ///
    /// Returns the number of bytes copied, which is less than `dest.len()` when the
    /// requested span runs past the end of this chunk. `start` must fall inside the chunk.
    pub fn read(&self, start: u64, dest: &mut [u8]) -> usize {
        debug_assert_le!(self.start, start);
        debug_assert_lt!(start - self.start, self.data.len() as u64);

        let offset = (start - self.start) as usize;
        let count = dest.len().min(self.data.len() - offset);
        dest[..count].copy_from_slice(&self.data[offset..offset + count]);
        count
    }

    pub(crate) fn into_data(self) -> Box<[u8]> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::Chunk;

    fn chunk_at(start: u64, len: usize) -> Chunk {
        let data: Vec<u8> = (0..len).map(|i| (start as usize + i) as u8).collect();
        Chunk::new(start, data.into_boxed_slice())
    }

    #[test]
    fn test_read_within_chunk() {
        let chunk = chunk_at(8, 4);
        let mut buf = [0u8; 2];
        assert_eq!(chunk.read(9, &mut buf), 2);
        assert_eq!(buf, [9, 10]);
    }

    #[test]
    fn test_read_truncated_at_chunk_end() {
        let chunk = chunk_at(8, 4);
        let mut buf = [0xffu8; 6];
        assert_eq!(chunk.read(10, &mut buf), 2);
        // only the front of the destination is touched
        assert_eq!(buf, [10, 11, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_read_whole_chunk() {
        let chunk = chunk_at(0, 4);
        let mut buf = [0u8; 4];
        assert_eq!(chunk.read(0, &mut buf), 4);
        assert_eq!(buf, [0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_destination() {
        let chunk = chunk_at(4, 4);
        assert_eq!(chunk.read(5, &mut []), 0);
    }

    #[test]
    fn test_bounds() {
        let chunk = chunk_at(4, 4);
        assert_eq!(chunk.end(), 8);
        assert!(!chunk.contains(3));
        assert!(chunk.contains(4));
        assert!(chunk.contains(7));
        assert!(!chunk.contains(8));
    }

    #[test]
    fn test_last_chunk_of_address_space() {
        let start = u64::MAX - 3;
        let chunk = Chunk::new(start, vec![1, 2, 3, 4].into_boxed_slice());
        assert_eq!(chunk.end(), u64::MAX);
        assert!(chunk.contains(u64::MAX));
        assert!(!chunk.contains(start - 1));

        let mut buf = [0u8; 4];
        assert_eq!(chunk.read(u64::MAX - 1, &mut buf), 2);
        assert_eq!(buf[..2], [3, 4]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_read_before_chunk_start() {
        let chunk = chunk_at(4, 4);
        let mut buf = [0u8; 1];
        chunk.read(3, &mut buf);
    }
}
