//! Error types for the squeeze library.

use thiserror::Error;

/// Main error type for the squeeze library.
#[derive(Error, Debug)]
pub enum Error {
    /// Container errors (demuxing/muxing).
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    /// Codec errors (encoding/decoding).
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Output strategy failures.
    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    /// I/O errors opening the source or the output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The validator decided the transcode would produce nothing useful.
    #[error("Validator rejected the transcode: {0}")]
    Validator(String),

    /// The negotiated encoder output does not belong to a supported
    /// output codec family.
    #[error("Invalid output format: {0}")]
    InvalidOutputFormat(String),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Releasing the codec/demuxer pipeline failed. Native resources may
    /// have leaked, so this is not an ordinary failure.
    #[error("Could not shut down the transcoding pipeline: {0}")]
    Shutdown(String),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Container format errors.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Track not found in container.
    #[error("Track {index} not found")]
    TrackNotFound { index: usize },

    /// Track has no index assigned in the output container yet.
    #[error("Output track for {0} is not registered")]
    TrackNotRegistered(String),

    /// Writing was attempted before the muxer was started.
    #[error("Muxer has not been started")]
    NotStarted,

    /// The muxer was started more than once.
    #[error("Muxer was already started")]
    AlreadyStarted,

    /// Invalid sample data.
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// Generic container error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for ContainerError {
    fn from(s: String) -> Self {
        ContainerError::Other(s)
    }
}

impl From<&str> for ContainerError {
    fn from(s: &str) -> Self {
        ContainerError::Other(s.to_string())
    }
}

/// Codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Codec has not been started.
    #[error("Codec not started")]
    NotStarted,

    /// Codec configuration error.
    #[error("Codec configuration error: {0}")]
    Config(String),

    /// Invalid buffer slot index.
    #[error("Invalid buffer slot: {index}")]
    InvalidSlot { index: usize },

    /// The codec never reported its output format.
    #[error("Output format could not be determined for track {track}")]
    FormatNotDetermined { track: usize },

    /// Generic codec error message.
    #[error("{0}")]
    Other(String),
}

impl From<String> for CodecError {
    fn from(s: String) -> Self {
        CodecError::Other(s)
    }
}

impl From<&str> for CodecError {
    fn from(s: &str) -> Self {
        CodecError::Other(s.to_string())
    }
}

/// Classified failures from an output strategy.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The strategy cannot produce an output format at all.
    #[error("Output format unavailable: {0}")]
    Unavailable(String),

    /// The input is already at or below the strategy's target. Recoverable
    /// at the per-track level by falling back to pass-through.
    #[error("Track is already compressed: {0}")]
    AlreadyCompressed(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Check if this error represents cancellation rather than failure.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Check if this error is fatal to the process state (leaked native
    /// handles or an unusable codec environment).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Shutdown(_) | Error::InvalidOutputFormat(_))
    }
}
