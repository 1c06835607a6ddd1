//! Transcoder for absent or removed tracks.

use super::TrackTranscoder;
use crate::queued::QueuedMuxer;
use squeeze_core::{Result, TrackFormat};
use squeeze_media::Demuxer;

/// Does nothing and is finished immediately. Used for tracks that are absent
/// from the input or removed from the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTrackTranscoder;

impl NoOpTrackTranscoder {
    /// Create a no-op transcoder.
    pub fn new() -> Self {
        Self
    }
}

impl TrackTranscoder for NoOpTrackTranscoder {
    fn setup(&mut self, _demuxer: &mut dyn Demuxer, _muxer: &mut QueuedMuxer) -> Result<()> {
        Ok(())
    }

    fn determined_format(&self) -> Option<&TrackFormat> {
        None
    }

    fn step(&mut self, _demuxer: &mut dyn Demuxer, _muxer: &mut QueuedMuxer) -> Result<bool> {
        Ok(false)
    }

    fn written_presentation_time_us(&self) -> i64 {
        0
    }

    fn is_finished(&self) -> bool {
        true
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
