//! The chunked read-buffer (`spec.md` §4.1): a linear big-endian byte cursor
//! over a pull-based chunk source, backing only memory proportional to the
//! current window.
//!
//! Grounded on the teacher's `PrefetchReader` (pooled-buffer chunked refill
//! from a `Read`) and `HprofRecordStreamParser`'s splice-the-unread-tail
//! loop, collapsed into one synchronous cursor — see `DESIGN.md` for why the
//! teacher's three-thread channel pipeline is not carried over.

use std::io::Read;

use crate::errors::{HprofError, Result};

/// Minimum bytes pulled per refill, to amortize allocation over many small
/// reads. `spec.md` §4.1 fixes this at 20 MiB.
pub const MIN_REFILL: usize = 20 * 1024 * 1024;

/// Chunk size used by the default [`ReadChunkSource`] blanket source.
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// A pull-based source of byte chunks. The buffer never looks past the
/// chunk boundary; a `None` return means the source is exhausted.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Adapts any [`std::io::Read`] into a [`ChunkSource`] by pulling
/// fixed-size chunks.
pub struct ReadChunkSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: Read> ReadChunkSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        ReadChunkSource { reader, chunk_size }
    }
}

impl<R: Read> ChunkSource for ReadChunkSource<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            Ok(None)
        } else {
            buf.truncate(filled);
            Ok(Some(buf))
        }
    }
}

/// The streaming cursor itself. Owns the current contiguous window and the
/// upstream chunk source; hides chunk boundaries from every caller.
pub struct ChunkBuffer<S> {
    source: S,
    window: Vec<u8>,
    pos: usize,
}

impl<S: ChunkSource> ChunkBuffer<S> {
    pub fn new(source: S) -> Self {
        ChunkBuffer {
            source,
            window: Vec::new(),
            pos: 0,
        }
    }

    fn remaining_in_window(&self) -> usize {
        self.window.len() - self.pos
    }

    /// Guarantee at least `n` contiguous bytes from the current position.
    pub fn ensure(&mut self, n: usize) -> Result<()> {
        if self.remaining_in_window() >= n {
            return Ok(());
        }
        let mut spliced = self.window[self.pos..].to_vec();
        let target = n.max(MIN_REFILL);
        while spliced.len() < target {
            match self.source.next_chunk()? {
                Some(chunk) => spliced.extend_from_slice(&chunk),
                None => break,
            }
        }
        let satisfied = spliced.len() >= n;
        self.window = spliced;
        self.pos = 0;
        if !satisfied {
            return Err(HprofError::EndOfStream);
        }
        Ok(())
    }

    /// `n` bytes starting at the cursor, aliasing the current window. Valid
    /// only until the next buffer operation.
    pub fn get(&mut self, n: usize) -> Result<&[u8]> {
        self.ensure(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.window[start..start + n])
    }

    /// Owned variant of [`Self::get`] for callers that must retain the bytes.
    pub fn get_copy(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.get(n)?.to_vec())
    }

    /// Advance the cursor by `n` bytes without materializing them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        let avail = self.remaining_in_window();
        if avail >= n {
            self.pos += n;
            return Ok(());
        }
        let mut remaining = n - avail;
        self.window = Vec::new();
        self.pos = 0;
        loop {
            match self.source.next_chunk()? {
                Some(chunk) => {
                    if chunk.len() <= remaining {
                        remaining -= chunk.len();
                        if remaining == 0 {
                            return Ok(());
                        }
                    } else {
                        self.pos = remaining;
                        self.window = chunk;
                        return Ok(());
                    }
                }
                None => return Err(HprofError::EndOfStream),
            }
        }
    }

    /// Read successive bytes until `terminator` is seen; return the bytes
    /// strictly preceding it and consume the sentinel.
    pub fn take(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.get_u8()?;
            if b == terminator {
                return Ok(out);
            }
            out.push(b);
        }
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.get(1)?[0])
    }

    pub fn get_i8(&mut self) -> Result<i8> {
        Ok(self.get_u8()? as i8)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let b = self.get(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        Ok(self.get_u16()? as i16)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.get(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(self.get_u32()? as i32)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let b = self.get(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_be_bytes(arr))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    /// Read an identifier of the given width, widened to `u64`.
    pub fn get_id(&mut self, id_size: crate::ids::IdSize) -> Result<u64> {
        use crate::ids::IdSize;
        match id_size {
            IdSize::One => Ok(self.get_u8()? as u64),
            IdSize::Two => Ok(self.get_u16()? as u64),
            IdSize::Four => Ok(self.get_u32()? as u64),
            IdSize::Eight => self.get_u64(),
        }
    }
}

/// An in-memory [`ChunkSource`] test double: a fixed sequence of
/// pre-sliced chunks, so chunk-boundary behavior can be exercised without a
/// filesystem.
#[cfg(test)]
pub struct VecChunkSource {
    chunks: std::collections::VecDeque<Vec<u8>>,
}

#[cfg(test)]
impl VecChunkSource {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        VecChunkSource {
            chunks: chunks.into(),
        }
    }

    /// Single chunk containing the whole stream.
    pub fn whole(bytes: Vec<u8>) -> Self {
        Self::new(vec![bytes])
    }
}

#[cfg(test)]
impl ChunkSource for VecChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_typed_values_across_one_chunk() {
        let bytes = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut buf = ChunkBuffer::new(VecChunkSource::whole(bytes));
        assert_eq!(buf.get_u8().unwrap(), 0x01);
        assert_eq!(buf.get_u16().unwrap(), 0x0203);
        assert_eq!(buf.get_u32().unwrap(), 0x0405_0607);
        assert_eq!(buf.get_u8().unwrap(), 0x08);
    }

    #[test]
    fn splices_a_value_straddling_a_chunk_boundary() {
        // u32 0xAABBCCDD split across two chunks.
        let source = VecChunkSource::new(vec![vec![0xAA, 0xBB], vec![0xCC, 0xDD]]);
        let mut buf = ChunkBuffer::new(source);
        assert_eq!(buf.get_u32().unwrap(), 0xAABB_CCDD);
    }

    #[test]
    fn skip_discards_whole_chunks_without_materializing_them() {
        let source = VecChunkSource::new(vec![vec![0; 100], vec![1, 2, 3, 4]]);
        let mut buf = ChunkBuffer::new(source);
        buf.skip(100).unwrap();
        assert_eq!(buf.get_u8().unwrap(), 1);
        assert_eq!(buf.get_u8().unwrap(), 2);
    }

    #[test]
    fn skip_lands_mid_chunk() {
        let source = VecChunkSource::new(vec![vec![9, 9, 1, 2, 3]]);
        let mut buf = ChunkBuffer::new(source);
        buf.skip(2).unwrap();
        assert_eq!(buf.get_u8().unwrap(), 1);
    }

    #[test]
    fn take_reads_up_to_sentinel_and_consumes_it() {
        let source = VecChunkSource::whole(b"JAVA PROFILE 1.0.2\0rest".to_vec());
        let mut buf = ChunkBuffer::new(source);
        let banner = buf.take(0).unwrap();
        assert_eq!(banner, b"JAVA PROFILE 1.0.2");
        assert_eq!(buf.get_u8().unwrap(), b'r');
    }

    #[test]
    fn exhaustion_before_enough_bytes_is_end_of_stream() {
        let source = VecChunkSource::whole(vec![1, 2, 3]);
        let mut buf = ChunkBuffer::new(source);
        let err = buf.get_u64().unwrap_err();
        assert!(matches!(err, HprofError::EndOfStream));
    }

    #[test]
    fn get_aliases_window_get_copy_owns_it() {
        let source = VecChunkSource::whole(vec![1, 2, 3, 4]);
        let mut buf = ChunkBuffer::new(source);
        let copy = buf.get_copy(2).unwrap();
        assert_eq!(copy, vec![1, 2]);
        let rest = buf.get(2).unwrap();
        assert_eq!(rest, &[3, 4]);
    }

    #[test]
    fn read_chunk_source_reads_whole_file_like_reader_in_fixed_chunks() {
        let data = vec![7u8; 25];
        let source = ReadChunkSource::with_chunk_size(std::io::Cursor::new(data.clone()), 10);
        let mut buf = ChunkBuffer::new(source);
        let all = buf.get_copy(25).unwrap();
        assert_eq!(all, data);
    }
}
