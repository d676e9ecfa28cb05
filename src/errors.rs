use thiserror::Error;

/// Every failure mode the decoder can surface.
///
/// `EndOfStream` is special: it is the normal termination sentinel when it
/// occurs at the outer record boundary (no partial record frame started)
/// and is swallowed by [`crate::read`] in that case. Everywhere else it
/// propagates like any other variant.
#[derive(Error, Debug)]
pub enum HprofError {
    #[error("end of stream")]
    EndOfStream,

    #[error("unsupported identifier size: {0} bytes")]
    UnsupportedIdSize(u32),

    #[error("unsupported value type code: 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("unsupported heap sub-record tag: 0x{0:02x}")]
    UnsupportedHeapSubRecord(u8),

    #[error(
        "heap dump sub-record accounting mismatch: expected {expected} bytes, consumed {actual}"
    )]
    BufferUnderflow { expected: u32, actual: u32 },

    #[error("invalid hprof header: {message}")]
    InvalidHeader { message: String },

    #[error("invalid utf-8 in record body: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HprofError>;
