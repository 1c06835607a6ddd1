//! Audio track transcoding: decode → remix/resample → encode.

use super::audio_bridge::AudioBridge;
use super::{DrainState, TrackTranscoder};
use crate::queued::QueuedMuxer;
use squeeze_core::{
    CodecError, ContainerError, Result, SampleFlags, SampleInfo, TrackFormat, TrackKind,
};
use squeeze_media::{CodecFactory, CodecUnit, Demuxer, OutputPoll};
use std::sync::Arc;

/// Decodes, remixes/resamples and re-encodes one audio track.
///
/// Shares the drain shape of the video transcoder, with an [`AudioBridge`]
/// in the middle instead of a rendering surface: decoded PCM is pulled off
/// the decoder in fixed-size windows and pushed into the encoder's input
/// queue in the layout the encoder requires.
pub struct AudioTrackTranscoder {
    track_index: usize,
    output_format: TrackFormat,
    factory: Arc<dyn CodecFactory>,
    decoder: Option<Box<dyn CodecUnit>>,
    encoder: Option<Box<dyn CodecUnit>>,
    bridge: Option<AudioBridge>,
    actual_format: Option<TrackFormat>,
    sample_buffer: Vec<u8>,
    extractor_eos: bool,
    decoder_eos: bool,
    encoder_eos: bool,
    decoder_started: bool,
    encoder_started: bool,
    written_pts_us: i64,
}

impl AudioTrackTranscoder {
    /// Create an audio transcoder targeting `output_format`.
    pub fn new(track_index: usize, output_format: TrackFormat, factory: Arc<dyn CodecFactory>) -> Self {
        Self {
            track_index,
            output_format,
            factory,
            decoder: None,
            encoder: None,
            bridge: None,
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

    fn drain_encoder(&mut self, muxer: &mut QueuedMuxer) -> Result<DrainState> {
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
                muxer.set_output_format(TrackKind::Audio, Some(format))?;
                Ok(DrainState::Retry)
            }
            OutputPoll::BuffersChanged => Ok(DrainState::Retry),
            OutputPoll::Buffer { index, mut info } => {
                if info.is_end_of_stream() {
                    self.encoder_eos = true;
                    info = SampleInfo::new(0, 0, info.flags);
                }
                muxer.write_sample(TrackKind::Audio, encoder.output_buffer(index), &info)?;
                if !info.is_end_of_stream() {
                    self.written_pts_us = info.pts_us;
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
            OutputPoll::FormatChanged => {
                // The decoder reported its actual PCM layout; the bridge
                // must convert from it, not from the container's claim.
                let format = decoder.output_format()?;
                if let (Some(bridge), Some(rate), Some(channels)) = (
                    self.bridge.as_mut(),
                    format.sample_rate(),
                    format.channel_count(),
                ) {
                    bridge.set_input_format(rate, channels)?;
                }
                Ok(DrainState::Retry)
            }
            OutputPoll::BuffersChanged => Ok(DrainState::Retry),
            OutputPoll::Buffer { index, info } => {
                if info.is_end_of_stream() {
                    self.decoder_eos = true;
                    if let Some(bridge) = self.bridge.as_mut() {
                        bridge.end_of_input();
                    }
                } else if let Some(bridge) = self.bridge.as_mut() {
                    bridge.push_pcm(decoder.output_buffer(index), info.pts_us);
                }
                decoder.release_output(index, false)?;
                Ok(DrainState::Consumed)
            }
        }
    }

    fn feed_encoder(&mut self) -> Result<bool> {
        let Some(bridge) = self.bridge.as_mut() else {
            return Ok(false);
        };
        let Some(encoder) = self.encoder.as_deref_mut() else {
            return Err(CodecError::NotStarted.into());
        };
        bridge.feed_encoder(encoder)
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

impl TrackTranscoder for AudioTrackTranscoder {
    fn setup(&mut self, demuxer: &mut dyn Demuxer, _muxer: &mut QueuedMuxer) -> Result<()> {
        let input = demuxer
            .track_format(self.track_index)
            .cloned()
            .ok_or(ContainerError::TrackNotFound {
                index: self.track_index,
            })?;
        let input_audio = input
            .audio
            .as_ref()
            .ok_or_else(|| CodecError::Config("input track has no audio attributes".into()))?;
        let output_audio = self
            .output_format
            .audio
            .as_ref()
            .ok_or_else(|| CodecError::Config("output format has no audio attributes".into()))?;
        self.bridge = Some(AudioBridge::new(
            input_audio.sample_rate,
            input_audio.channel_count,
            output_audio.sample_rate,
            output_audio.channel_count,
        )?);
        let mut decoder = self.factory.audio_decoder(&input)?;
        let mut encoder = self.factory.audio_encoder(&self.output_format)?;
        encoder.start()?;
        self.encoder_started = true;
        decoder.start()?;
        self.decoder_started = true;
        self.encoder = Some(encoder);
        self.decoder = Some(decoder);
        Ok(())
    }

    fn determined_format(&self) -> Option<&TrackFormat> {
        self.actual_format.as_ref()
    }

    fn step(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<bool> {
        let mut busy = false;
        while self.drain_encoder(muxer)? != DrainState::None {
            busy = true;
        }
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
        while self.feed_encoder()? {
            busy = true;
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
        self.bridge = None;
        Ok(())
    }
}
