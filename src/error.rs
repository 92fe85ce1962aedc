use crate::source::wav;
use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be opened, or its format could not be introspected
    #[error("failed to open audio source: {0}")]
    UnopenableSource(String),

    /// A conversion buffer or the conversion unit could not be constructed
    #[error("failed to allocate conversion resources: {0}")]
    AllocationFailure(String),

    /// The requested output format is not something we can produce
    #[error("unsupported target format: {0}")]
    UnsupportedFormat(String),

    /// The conversion unit hit an unrecoverable error; no partial output is kept
    #[error("conversion failed: {0}")]
    ConversionError(String),

    /// A converter only runs once
    #[error("converter has already finished")]
    ConverterFinished,

    /// A single read from a source failed
    #[error("read failed: {0}")]
    Read(String),

    /// In-memory WAV data could not be parsed
    #[error("wav: {0}")]
    Wav(#[from] wav::Error),

    /// "catch-all" error type returned by CPAL in cases of unknown or unexpected errors
    #[error("cpal backend error: {0}")]
    CPALError(cpal::BackendSpecificError),

    /// The device no longer exists (ie. it has been disabled or unplugged)
    #[error("input device not available")]
    DeviceNotAvailable,

    /// The device doesn't support any of the capture configurations we can use
    #[error("input device not usable")]
    DeviceNotUsable,

    /// An invalid argument was provided somewhere in the CPAL backend
    #[error("invalid argument passed to the audio backend")]
    InvalidArgument,

    /// There is no input device available
    #[error("no input device available")]
    NoInputDevice,

    /// Occurs if adding a new Stream ID would cause an integer overflow.
    #[error("stream id overflow")]
    StreamIdOverflow,

    #[error("fingerprinting failed: {0}")]
    Fingerprint(String),

    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    #[error("media library write failed: {0}")]
    Library(String),

    /// A match is already in flight on this recognizer
    #[error("a match is already in progress")]
    AlreadyMatching,
}
