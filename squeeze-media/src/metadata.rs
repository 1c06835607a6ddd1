//! Metadata retrieval capability.

use std::fmt;

/// Container-level metadata fields the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Video rotation in integer degrees.
    Rotation,
    /// Geolocation string in ISO-6709 style.
    Location,
    /// Container duration in milliseconds.
    DurationMillis,
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotation => write!(f, "rotation"),
            Self::Location => write!(f, "location"),
            Self::DurationMillis => write!(f, "duration"),
        }
    }
}

/// Extracts container-level metadata from a media source.
///
/// Values are returned as raw strings; tolerating malformed or absent values
/// is the caller's job.
pub trait MetadataRetriever: Send {
    /// Extract one metadata value, or `None` when absent.
    fn extract(&mut self, key: MetadataKey) -> Option<String>;

    /// Release the retriever.
    fn release(&mut self);
}
