//! Sample queue muxer.
//!
//! Buffers encoded samples until every active track's output format is
//! known, then registers the tracks, starts the container muxer exactly
//! once, flushes the buffered samples in their original insertion order and
//! switches to direct writes.

use squeeze_core::{mime, ContainerError, Error, Result, SampleInfo, TrackFormat, TrackKind};
use squeeze_media::ContainerMuxer;
use tracing::{debug, trace};

/// Initial capacity of the pre-barrier byte buffer.
const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct TrackSlot {
    /// Whether this kind participates in the transcode at all.
    transcoding: bool,
    /// Determined output format, once known.
    format: Option<TrackFormat>,
    /// Set when a pass-through over an absent track excludes this kind from
    /// the barrier.
    excluded: bool,
    /// Muxer-assigned track index, once registered.
    track_index: Option<usize>,
}

impl TrackSlot {
    fn ready(&self) -> bool {
        !self.transcoding || self.excluded || self.format.is_some()
    }
}

#[derive(Debug)]
struct PendingSample {
    kind: TrackKind,
    info: SampleInfo,
}

/// A muxer wrapper that enforces the format barrier.
pub struct QueuedMuxer {
    muxer: Box<dyn ContainerMuxer>,
    video: TrackSlot,
    audio: TrackSlot,
    /// Kinds in the order their formats became known.
    arrival: Vec<TrackKind>,
    pending: Vec<PendingSample>,
    byte_buffer: Vec<u8>,
    started: bool,
}

impl QueuedMuxer {
    /// Wrap `muxer`, declaring which kinds participate in the transcode.
    pub fn new(muxer: Box<dyn ContainerMuxer>, video: bool, audio: bool) -> Self {
        Self {
            muxer,
            video: TrackSlot {
                transcoding: video,
                ..TrackSlot::default()
            },
            audio: TrackSlot {
                transcoding: audio,
                ..TrackSlot::default()
            },
            arrival: Vec::new(),
            pending: Vec::new(),
            byte_buffer: Vec::new(),
            started: false,
        }
    }

    fn slot(&self, kind: TrackKind) -> &TrackSlot {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }

    fn slot_mut(&mut self, kind: TrackKind) -> &mut TrackSlot {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
        }
    }

    /// Whether the container muxer has been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Record the determined output format for `kind`. `None` excludes the
    /// kind from the barrier (a pass-through over an absent track).
    ///
    /// The instant every active kind is ready the muxer is started and
    /// buffered samples are flushed.
    pub fn set_output_format(
        &mut self,
        kind: TrackKind,
        format: Option<TrackFormat>,
    ) -> Result<()> {
        match format {
            Some(format) => {
                if self.slot(kind).format.is_none() {
                    self.arrival.push(kind);
                }
                self.slot_mut(kind).format = Some(format);
            }
            None => self.slot_mut(kind).excluded = true,
        }
        self.try_start()
    }

    fn try_start(&mut self) -> Result<()> {
        if self.started || !self.video.ready() || !self.audio.ready() {
            return Ok(());
        }

        // All formats are determined. Stop buffering and start muxing.
        if let Some(format) = self.video.format.as_ref() {
            validate_video_output(format)?;
        }
        if let Some(format) = self.audio.format.as_ref() {
            validate_audio_output(format)?;
        }
        for kind in self.arrival.clone() {
            let Some(format) = self.slot(kind).format.clone() else {
                continue;
            };
            let index = self.muxer.add_track(&format)?;
            debug!("added {kind} track #{index} ({format}) to muxer");
            self.slot_mut(kind).track_index = Some(index);
        }
        self.muxer.start()?;
        self.started = true;

        if !self.pending.is_empty() {
            debug!(
                samples = self.pending.len(),
                bytes = self.byte_buffer.len(),
                "output formats determined, writing pending data to muxer"
            );
            let pending = std::mem::take(&mut self.pending);
            let bytes = std::mem::take(&mut self.byte_buffer);
            let mut offset = 0;
            for sample in pending {
                let index = self.track_index(sample.kind)?;
                self.muxer
                    .write_sample(index, &bytes[offset..offset + sample.info.size], &sample.info)?;
                offset += sample.info.size;
            }
        }
        Ok(())
    }

    fn track_index(&self, kind: TrackKind) -> Result<usize> {
        self.slot(kind)
            .track_index
            .ok_or_else(|| ContainerError::TrackNotRegistered(kind.to_string()).into())
    }

    /// Write one sample. Buffered before the barrier, direct afterwards.
    /// End-of-stream descriptors are consumed here and never reach the
    /// container muxer.
    pub fn write_sample(&mut self, kind: TrackKind, data: &[u8], info: &SampleInfo) -> Result<()> {
        if info.is_end_of_stream() {
            trace!("end of {kind} stream reached");
            return Ok(());
        }
        if self.started {
            let index = self.track_index(kind)?;
            self.muxer.write_sample(index, &data[..info.size], info)
        } else {
            if self.byte_buffer.is_empty() {
                self.byte_buffer.reserve(BUFFER_SIZE);
            }
            self.byte_buffer.extend_from_slice(&data[..info.size]);
            self.pending.push(PendingSample { kind, info: *info });
            Ok(())
        }
    }

    /// Finalize the container. When no kind is active the muxer is started
    /// first so an empty container is still valid output.
    pub fn stop(&mut self) -> Result<()> {
        self.try_start()?;
        if !self.started {
            return Err(Error::Container(ContainerError::NotStarted));
        }
        self.muxer.stop()
    }

    /// Release the wrapped container muxer.
    pub fn release(&mut self) -> Result<()> {
        self.muxer.release()
    }
}

/// After encoding, the negotiated output must belong to the single supported
/// codec family per kind; anything else is a configuration/environment
/// problem, not retried.
fn validate_video_output(format: &TrackFormat) -> Result<()> {
    if format.mime != mime::VIDEO_AVC {
        return Err(Error::InvalidOutputFormat(format!(
            "video codecs other than AVC are not supported, actual mime type: {}",
            format.mime
        )));
    }
    Ok(())
}

fn validate_audio_output(format: &TrackFormat) -> Result<()> {
    if format.mime != mime::AUDIO_AAC {
        return Err(Error::InvalidOutputFormat(format!(
            "audio codecs other than AAC are not supported, actual mime type: {}",
            format.mime
        )));
    }
    Ok(())
}
