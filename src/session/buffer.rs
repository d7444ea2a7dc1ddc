//! Bounded per-session chunk buffer.
//!
//! Browser-encoded streams (WebM/Ogg) front-load their container header, so
//! a naive trailing-window buffer eventually drops the header and every
//! later snapshot becomes undecodable. The buffer therefore pins the first
//! `header_reserve` bytes and bounds only the audio that follows.

/// Accumulates raw encoded chunks for one session.
///
/// Memory is bounded: the buffer keeps at most `header_reserve` pinned
/// header bytes plus `max_bytes` of trailing stream. With
/// `header_reserve == 0` this degrades to a plain trailing-window buffer,
/// which is the right shape for raw PCM streams.
#[derive(Debug)]
pub struct ChunkBuffer {
    data: Vec<u8>,
    /// Bytes at the front that are never evicted (container header).
    header_reserve: usize,
    /// Cap on bytes after the pinned header.
    max_bytes: usize,
    /// How much header has actually been pinned so far.
    header_len: usize,
}

impl ChunkBuffer {
    pub fn new(max_bytes: usize, header_reserve: usize) -> Self {
        Self {
            data: Vec::new(),
            header_reserve,
            max_bytes,
            header_len: 0,
        }
    }

    /// Append a chunk, evicting the oldest post-header bytes when over cap.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);

        // The header region fills from the first appends and then freezes.
        if self.header_len < self.header_reserve {
            self.header_len = self.data.len().min(self.header_reserve);
        }

        let limit = self.header_len + self.max_bytes;
        if self.data.len() > limit {
            let excess = self.data.len() - limit;
            self.data.drain(self.header_len..self.header_len + excess);
        }
    }

    /// Copy of the current contents: pinned header plus trailing stream.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discard everything, including the pinned header.
    pub fn clear(&mut self) {
        self.data.clear();
        self.header_len = 0;
    }
}
