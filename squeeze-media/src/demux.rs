//! Demuxer capability.

use squeeze_core::{Result, SampleInfo, TrackFormat};

/// Reads a container and exposes its elementary tracks and compressed
/// samples through a current-sample cursor.
///
/// Only samples of selected tracks are visible through the cursor. The
/// demuxer is shared between both track pipelines of one transcode and is
/// only ever accessed from the transcode's worker thread.
pub trait Demuxer: Send {
    /// Number of tracks in the container.
    fn track_count(&self) -> usize;

    /// Format of the given track.
    fn track_format(&self, index: usize) -> Option<&TrackFormat>;

    /// Select a track so its samples appear on the cursor.
    fn select_track(&mut self, index: usize);

    /// Track index of the current sample, or `None` when every selected
    /// track is exhausted.
    fn sample_track_index(&mut self) -> Option<usize>;

    /// Copy the current sample's bytes into `buf` (clearing it first) and
    /// return its descriptor. The key-frame flag is carried in the
    /// descriptor. Does not advance the cursor.
    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<SampleInfo>;

    /// Advance the cursor to the next sample. Returns false when no sample
    /// remains.
    fn advance(&mut self) -> bool;

    /// Release the demuxer and its native resources.
    fn release(&mut self) -> Result<()>;
}
