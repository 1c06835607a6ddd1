//! Byte-identical track copying.

use super::TrackTranscoder;
use crate::queued::QueuedMuxer;
use squeeze_core::{ContainerError, Result, SampleInfo, TrackFormat, TrackKind};
use squeeze_media::Demuxer;

/// Copies compressed samples straight from the demuxer to the muxer, with no
/// decode or encode.
pub struct PassThroughTrackTranscoder {
    track_index: Option<usize>,
    kind: TrackKind,
    format: Option<TrackFormat>,
    buffer: Vec<u8>,
    written_pts_us: i64,
    finished: bool,
}

impl PassThroughTrackTranscoder {
    /// Create a pass-through transcoder for the given track. `None` means
    /// the track is absent; the muxer is then told to exclude this sample
    /// kind from the format barrier.
    pub fn new(track_index: Option<usize>, kind: TrackKind) -> Self {
        Self {
            track_index,
            kind,
            format: None,
            buffer: Vec::new(),
            written_pts_us: 0,
            finished: false,
        }
    }
}

impl TrackTranscoder for PassThroughTrackTranscoder {
    fn setup(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<()> {
        match self.track_index {
            Some(index) => {
                let format = demuxer
                    .track_format(index)
                    .cloned()
                    .ok_or(ContainerError::TrackNotFound { index })?;
                muxer.set_output_format(self.kind, Some(format.clone()))?;
                if let Some(size) = format.max_input_size {
                    self.buffer.reserve(size);
                }
                self.format = Some(format);
            }
            None => {
                // Track is absent; the muxer must not wait for our format.
                muxer.set_output_format(self.kind, None)?;
                self.finished = true;
            }
        }
        Ok(())
    }

    fn determined_format(&self) -> Option<&TrackFormat> {
        self.format.as_ref()
    }

    fn step(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let Some(track_index) = self.track_index else {
            return Ok(false);
        };
        match demuxer.sample_track_index() {
            None => {
                muxer.write_sample(self.kind, &[], &SampleInfo::end_of_stream())?;
                self.finished = true;
                Ok(true)
            }
            Some(current) if current != track_index => Ok(false),
            Some(_) => {
                let info = demuxer.read_sample(&mut self.buffer)?;
                muxer.write_sample(self.kind, &self.buffer, &info)?;
                self.written_pts_us = info.pts_us;
                demuxer.advance();
                Ok(true)
            }
        }
    }

    fn written_presentation_time_us(&self) -> i64 {
        self.written_pts_us
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
