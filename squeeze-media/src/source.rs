//! Input and output capabilities.

use crate::demux::Demuxer;
use crate::metadata::MetadataRetriever;
use crate::mux::ContainerMuxer;
use squeeze_core::Result;

/// A seekable/readable media source.
///
/// Implementations are expected externally for raw file handles, paths and
/// platform content URIs.
pub trait DataSource: Send {
    /// Open a demuxer against this source.
    fn demuxer(&mut self) -> Result<Box<dyn Demuxer>>;

    /// Open a metadata retriever against this source.
    fn metadata(&mut self) -> Result<Box<dyn MetadataRetriever>>;

    /// Release the source. Idempotent.
    fn release(&mut self);
}

/// A destination that can open a container muxer.
pub trait OutputSink: Send {
    /// Open the container muxer for writing. Failing to open surfaces as an
    /// I/O error.
    fn open(&mut self) -> Result<Box<dyn ContainerMuxer>>;
}
