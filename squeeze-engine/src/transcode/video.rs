//! Video track transcoding: decode → render → encode.

use super::{DrainState, TrackTranscoder};
use crate::queued::QueuedMuxer;
use squeeze_core::{
    CodecError, ContainerError, Error, Result, SampleFlags, SampleInfo, TrackFormat, TrackKind,
};
use squeeze_media::{CodecFactory, CodecUnit, Demuxer, OutputPoll, RenderSurface, VideoCodecs};
use std::sync::Arc;

/// Decodes, renders and re-encodes one video track.
///
/// Decoded frames are transferred to the encoder through a shared rendering
/// surface, so no pixel data crosses this struct. Each step performs up to
/// three non-blocking drain passes in a fixed order (encoder, decoder,
/// extractor); draining the encoder first keeps its bounded input queue from
/// deadlocking the decoder.
pub struct VideoTrackTranscoder {
    track_index: usize,
    output_format: TrackFormat,
    factory: Arc<dyn CodecFactory>,
    decoder: Option<Box<dyn CodecUnit>>,
    encoder: Option<Box<dyn CodecUnit>>,
    surface: Option<Box<dyn RenderSurface>>,
    actual_format: Option<TrackFormat>,
    sample_buffer: Vec<u8>,
    extractor_eos: bool,
    decoder_eos: bool,
    encoder_eos: bool,
    decoder_started: bool,
    encoder_started: bool,
    written_pts_us: i64,
}

impl VideoTrackTranscoder {
    /// Create a video transcoder targeting `output_format`.
    pub fn new(track_index: usize, output_format: TrackFormat, factory: Arc<dyn CodecFactory>) -> Self {
        Self {
            track_index,
            output_format,
            factory,
            decoder: None,
            encoder: None,
            surface: None,
            actual_format: None,
            sample_buffer: Vec::new(),
            extractor_eos: false,
            decoder_eos: false,
            encoder_eos: false,
            decoder_started: false,
            encoder_started: false,
            written_pts_us: 0,
        }
    }

    /// Fill the pipeline without writing samples to the muxer until the
    /// encoder reports its output format. Used when a track's output format
    /// must be known before any sample is written. The track must already be
    /// the only one selected on the demuxer.
    pub fn determine_format(
        &mut self,
        demuxer: &mut dyn Demuxer,
        muxer: &mut QueuedMuxer,
    ) -> Result<()> {
        demuxer.select_track(self.track_index);
        while self.actual_format.is_none() && !self.encoder_eos {
            if let Some(current) = demuxer.sample_track_index() {
                if current != self.track_index {
                    return Err(Error::invalid_param(format!(
                        "no other track may be selected while determining the format; \
                         expected track {} but got a sample of track {current}",
                        self.track_index
                    )));
                }
            }
            // Fill the pipeline front to back.
            self.drain_extractor(demuxer)?;
            while self.drain_decoder()? == DrainState::Retry {}
            while self.actual_format.is_none()
                && self.drain_encoder(muxer, false)? == DrainState::Retry
            {}
        }
        if self.actual_format.is_none() {
            return Err(CodecError::FormatNotDetermined {
                track: self.track_index,
            }
            .into());
        }
        Ok(())
    }

    fn drain_encoder(&mut self, muxer: &mut QueuedMuxer, write_samples: bool) -> Result<DrainState> {
        if self.encoder_eos {
            return Ok(DrainState::None);
        }
        let Some(encoder) = self.encoder.as_deref_mut() else {
            return Err(CodecError::NotStarted.into());
        };
        match encoder.dequeue_output()? {
            OutputPoll::Pending => Ok(DrainState::None),
            OutputPoll::FormatChanged => {
                let format = encoder.output_format()?;
                self.actual_format = Some(format.clone());
                muxer.set_output_format(TrackKind::Video, Some(format))?;
                Ok(DrainState::Retry)
            }
            OutputPoll::BuffersChanged => Ok(DrainState::Retry),
            OutputPoll::Buffer { index, mut info } => {
                if info.is_end_of_stream() {
                    self.encoder_eos = true;
                    info = SampleInfo::new(0, 0, info.flags);
                }
                if write_samples {
                    muxer.write_sample(TrackKind::Video, encoder.output_buffer(index), &info)?;
                    if !info.is_end_of_stream() {
                        self.written_pts_us = info.pts_us;
                    }
                }
                encoder.release_output(index, false)?;
                Ok(DrainState::Consumed)
            }
        }
    }

    fn drain_decoder(&mut self) -> Result<DrainState> {
        if self.decoder_eos {
            return Ok(DrainState::None);
        }
        let Some(decoder) = self.decoder.as_deref_mut() else {
            return Err(CodecError::NotStarted.into());
        };
        match decoder.dequeue_output()? {
            OutputPoll::Pending => Ok(DrainState::None),
            OutputPoll::FormatChanged | OutputPoll::BuffersChanged => Ok(DrainState::Retry),
            OutputPoll::Buffer { index, info } => {
                if info.is_end_of_stream() {
                    if let Some(encoder) = self.encoder.as_deref_mut() {
                        encoder.signal_end_of_input()?;
                    }
                    self.decoder_eos = true;
                }
                let render = info.size > 0;
                decoder.release_output(index, render)?;
                if render {
                    if let Some(surface) = self.surface.as_deref_mut() {
                        // The rendered image lands on the shared surface;
                        // hand it to the encoder with a nanosecond timestamp.
                        surface.await_frame()?;
                        surface.publish(info.pts_us.saturating_mul(1000))?;
                    }
                }
                Ok(DrainState::Consumed)
            }
        }
    }

    fn drain_extractor(&mut self, demuxer: &mut dyn Demuxer) -> Result<DrainState> {
        if self.extractor_eos {
            return Ok(DrainState::None);
        }
        let current = demuxer.sample_track_index();
        if matches!(current, Some(track) if track != self.track_index) {
            return Ok(DrainState::None);
        }
        let Some(decoder) = self.decoder.as_deref_mut() else {
            return Err(CodecError::NotStarted.into());
        };
        let Some(slot) = decoder.dequeue_input() else {
            return Ok(DrainState::None);
        };
        if current.is_none() {
            self.extractor_eos = true;
            decoder.queue_input(slot, &[], 0, SampleFlags::END_OF_STREAM)?;
            return Ok(DrainState::None);
        }
        let info = demuxer.read_sample(&mut self.sample_buffer)?;
        decoder.queue_input(
            slot,
            &self.sample_buffer,
            info.pts_us,
            info.flags & SampleFlags::KEY_FRAME,
        )?;
        demuxer.advance();
        Ok(DrainState::Consumed)
    }
}

impl TrackTranscoder for VideoTrackTranscoder {
    fn setup(&mut self, demuxer: &mut dyn Demuxer, _muxer: &mut QueuedMuxer) -> Result<()> {
        let input = demuxer
            .track_format(self.track_index)
            .cloned()
            .ok_or(ContainerError::TrackNotFound {
                index: self.track_index,
            })?;
        let VideoCodecs {
            mut decoder,
            mut encoder,
            surface,
        } = self.factory.video_codecs(&input, &self.output_format)?;
        encoder.start()?;
        self.encoder_started = true;
        decoder.start()?;
        self.decoder_started = true;
        self.encoder = Some(encoder);
        self.decoder = Some(decoder);
        self.surface = Some(surface);
        Ok(())
    }

    fn determined_format(&self) -> Option<&TrackFormat> {
        self.actual_format.as_ref()
    }

    fn step(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<bool> {
        let mut busy = false;
        while self.drain_encoder(muxer, true)? != DrainState::None {
            busy = true;
        }
        // Not repeated on a consumed frame, to keep from deadlocking when
        // the encoder queue is full.
        loop {
            match self.drain_decoder()? {
                DrainState::Retry => busy = true,
                DrainState::Consumed => {
                    busy = true;
                    break;
                }
                DrainState::None => break,
            }
        }
        while self.drain_extractor(demuxer)? == DrainState::Consumed {
            busy = true;
        }
        Ok(busy)
    }

    fn written_presentation_time_us(&self) -> i64 {
        self.written_pts_us
    }

    fn is_finished(&self) -> bool {
        self.encoder_eos
    }

    fn release(&mut self) -> Result<()> {
        if let Some(mut decoder) = self.decoder.take() {
            if self.decoder_started {
                decoder.stop()?;
            }
            decoder.release()?;
        }
        if let Some(mut encoder) = self.encoder.take() {
            if self.encoder_started {
                encoder.stop()?;
            }
            encoder.release()?;
        }
        self.surface = None;
        Ok(())
    }
}
