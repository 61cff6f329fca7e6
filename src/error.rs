//! Error hierarchy shared by every public entry point in this crate.

use thiserror::Error;

/// Everything that can go wrong in a compress/decompress call.
///
/// A successful-but-not-useful compression (the codec couldn't shrink the
/// block) is not an error: it is represented as `Ok(0)` per [`crate::codec`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("codec unavailable: {0}")]
    CodecUnavailable(String),

    #[error("codec failure: {0}")]
    CodecFailure(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps to the legacy C-shaped negative-error-code convention used by
    /// the `blosc1_*` style entry points in [`crate::context`].
    pub fn as_legacy_code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) => -12,
            Error::CorruptInput(_) => -3,
            Error::CodecUnavailable(_) => -7,
            Error::CodecFailure(_) => -8,
            Error::ResourceExhausted(_) => -26,
        }
    }
}
