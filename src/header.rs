//! The fixed file header (`spec.md` §3, §6): a null-terminated ASCII format
//! banner, the dump-declared identifier size, and an absolute millisecond
//! timestamp. Immutable once read; everything after it depends on `id_size`.

use chrono::{DateTime, Utc};

use crate::buffer::ChunkBuffer;
use crate::errors::{HprofError, Result};
use crate::ids::IdSize;

#[derive(Debug, Clone)]
pub struct Header {
    pub format: String,
    pub id_size: IdSize,
    pub timestamp_millis: u64,
}

impl Header {
    /// The header's timestamp as a [`chrono::DateTime`], derived from the
    /// canonical `timestamp_millis` field (not stored redundantly).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis as i64)
    }

    pub(crate) fn read<S: crate::buffer::ChunkSource>(buf: &mut ChunkBuffer<S>) -> Result<Header> {
        let banner_bytes = buf.take(0)?;
        let format = String::from_utf8(banner_bytes)?;
        let id_size_raw = buf.get_u32()?;
        let id_size = IdSize::try_from(id_size_raw)?;
        let timestamp_millis = buf.get_u64()?;
        Ok(Header {
            format,
            id_size,
            timestamp_millis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::VecChunkSource;

    fn bytes_for(format: &str, id_size: u32, millis: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format.as_bytes());
        out.push(0);
        out.extend_from_slice(&id_size.to_be_bytes());
        out.extend_from_slice(&millis.to_be_bytes());
        out
    }

    #[test]
    fn reads_minimal_header() {
        let bytes = bytes_for("JAVA PROFILE 1.0.2", 8, 0);
        let mut buf = ChunkBuffer::new(VecChunkSource::whole(bytes));
        let header = Header::read(&mut buf).unwrap();
        assert_eq!(header.format, "JAVA PROFILE 1.0.2");
        assert_eq!(header.id_size, IdSize::Eight);
        assert_eq!(header.timestamp_millis, 0);
    }

    #[test]
    fn rejects_unsupported_id_size() {
        let bytes = bytes_for("JAVA PROFILE 1.0.2", 3, 0);
        let mut buf = ChunkBuffer::new(VecChunkSource::whole(bytes));
        let err = Header::read(&mut buf).unwrap_err();
        assert!(matches!(err, HprofError::UnsupportedIdSize(3)));
    }

    #[test]
    fn timestamp_converts_to_a_datetime() {
        let bytes = bytes_for("JAVA PROFILE 1.0.2", 8, 1_700_000_000_000);
        let mut buf = ChunkBuffer::new(VecChunkSource::whole(bytes));
        let header = Header::read(&mut buf).unwrap();
        assert!(header.timestamp().is_some());
    }
}
