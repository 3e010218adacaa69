use parking_lot::Mutex;
use thiserror::Error;

/// A deterministic, addressable byte source.
///
/// The identity source returns `offset as u8` at every offset; seeded sources mix the seed
/// into the offset. A source with a length leaves buffer bytes past its end untouched,
/// mimicking a fetch that runs into the end of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSource {
    seed: u64,
    len: Option<u64>,
}

impl PatternSource {
    pub fn identity() -> Self {
        Self { seed: 0, len: None }
    }

    pub fn new(seed: u64) -> Self {
        Self { seed, len: None }
    }

    pub fn with_len(self, len: u64) -> Self {
        Self { len: Some(len), ..self }
    }

    pub fn byte_at(&self, offset: u64) -> u8 {
        if self.seed == 0 {
            offset as u8
        } else {
            (offset.wrapping_add(self.seed).wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 56) as u8
        }
    }

    /// The source bytes `[start, start + len)`.
    pub fn bytes(&self, start: u64, len: usize) -> Vec<u8> {
        (0..len as u64).map(|i| self.byte_at(start.wrapping_add(i))).collect()
    }

    /// Fill `buf` from `offset`, stopping at the end of the source. Returns the bytes written.
    pub fn fill(&self, offset: u64, buf: &mut [u8]) -> usize {
        let available = match self.len {
            Some(len) => len.saturating_sub(offset).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        for (i, b) in buf[..available].iter_mut().enumerate() {
            *b = self.byte_at(offset.wrapping_add(i as u64));
        }
        available
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("fetch failed at offset {offset}")]
pub struct FetchError {
    pub offset: u64,
}

/// Fetches from a [`PatternSource`] and records every call as `(offset, buffer length)`.
#[derive(Debug)]
pub struct RecordingFetcher {
    source: PatternSource,
    fail_at: Option<u64>,
    calls: Mutex<Vec<(u64, usize)>>,
}

impl RecordingFetcher {
    pub fn new(source: PatternSource) -> Self {
        Self {
            source,
            fail_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every fetch for the chunk starting at `offset`.
    pub fn fail_at(self, offset: u64) -> Self {
        Self {
            fail_at: Some(offset),
            ..self
        }
    }

    pub fn fetch(&self, offset: u64, buf: &mut [u8]) -> Result<(), FetchError> {
        self.calls.lock().push((offset, buf.len()));
        if self.fail_at == Some(offset) {
            return Err(FetchError { offset });
        }
        self.source.fill(offset, buf);
        Ok(())
    }

    pub fn calls(&self) -> Vec<(u64, usize)> {
        self.calls.lock().clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|(offset, _)| *offset).collect()
    }

    pub fn num_calls(&self) -> usize {
        self.calls.lock().len()
    }
}
