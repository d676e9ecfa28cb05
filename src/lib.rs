//! Streaming decoder for the JVM HPROF heap dump binary format.
//!
//! The entry points are [`read`] (drive any [`Visitor`] over any
//! [`ChunkSource`]) and [`slurp`] (convenience wrapper returning the
//! built-in [`Aggregator`] histogram over anything implementing
//! [`std::io::Read`]). The decoder never buffers more than a small multiple
//! of one chunk at a time regardless of dump size; see [`buffer`] for the
//! windowed cursor this relies on.
//!
//! ```no_run
//! use std::fs::File;
//! use hprof_stream::{slurp, Flags};
//!
//! let file = File::open("heap.hprof")?;
//! let aggregator = slurp(file, Flags::empty())?;
//! for entry in aggregator.entries().iter().take(10) {
//!     println!("{:>12} bytes  {:>8} instances  {}", entry.shallow_bytes, entry.instance_count, entry.label);
//! }
//! # Ok::<(), hprof_stream::HprofError>(())
//! ```

pub mod aggregator;
pub mod buffer;
pub mod errors;
pub mod flags;
pub mod gc_record;
pub mod header;
pub mod ids;
pub mod record;
pub mod visitor;

pub use aggregator::{Aggregator, ClassTotals, Entry, Totals};
pub use buffer::{ChunkBuffer, ChunkSource, ReadChunkSource};
pub use errors::{HprofError, Result};
pub use flags::Flags;
pub use header::Header;
pub use ids::{IdSize, ValueType};
pub use visitor::{AllocSite, Visitor};

/// Decode `source` from the start of an hprof stream, delivering every
/// record and heap sub-record to `visitor`. Blocks the calling thread on
/// `ChunkSource::next_chunk` exactly where the buffer needs more bytes;
/// there is no background prefetch thread.
pub fn read<S: ChunkSource, V: Visitor>(source: S, visitor: &mut V, flags: Flags) -> Result<()> {
    record::read(source, visitor, flags)
}

/// Decode `reader` (chunked via [`ReadChunkSource`]) into the built-in
/// [`Aggregator`] histogram.
pub fn slurp<R: std::io::Read>(reader: R, flags: Flags) -> Result<Aggregator> {
    let mut aggregator = Aggregator::new();
    read(ReadChunkSource::new(reader), &mut aggregator, flags)?;
    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer::VecChunkSource;

    #[test]
    fn public_read_reaches_a_custom_visitor() {
        let mut bytes = b"JAVA PROFILE 1.0.2".to_vec();
        bytes.push(0);
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());

        struct SawHeader(bool);
        impl Visitor for SawHeader {
            fn header(&mut self, _header: &Header) {
                self.0 = true;
            }
        }

        let mut visitor = SawHeader(false);
        read(VecChunkSource::whole(bytes), &mut visitor, Flags::empty()).unwrap();
        assert!(visitor.0);
    }

    #[test]
    fn slurp_runs_the_built_in_aggregator_over_a_reader() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let mut bytes = b"JAVA PROFILE 1.0.2".to_vec();
        bytes.push(0);
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());

        let aggregator = slurp(std::io::Cursor::new(bytes), Flags::empty()).unwrap();
        assert!(aggregator.entries().is_empty());
    }
}
