//! PCM bridge between the audio decoder and encoder.
//!
//! Decoded PCM never matches the encoder's required layout by accident:
//! the bridge remixes mono↔stereo and resamples between the two rates,
//! feeding the encoder fixed-size sample windows. Buffers of mismatched
//! layouts are never forwarded as-is.

use byteorder::{ByteOrder, LittleEndian};
use squeeze_core::{CodecError, Result, SampleFlags};
use squeeze_media::CodecUnit;
use std::collections::VecDeque;

/// Frames per window pushed into one encoder input slot.
const WINDOW_FRAMES: usize = 1024;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Channel remixing mode, chosen from the channel counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remix {
    /// Same channel count; copy.
    PassThrough,
    /// Mono to stereo; duplicate each sample.
    UpMix,
    /// Stereo to mono; average each pair.
    DownMix,
}

impl Remix {
    fn choose(input_channels: u32, output_channels: u32) -> Result<Self> {
        if input_channels > 2 || output_channels > 2 {
            return Err(CodecError::Config(format!(
                "channel layouts beyond stereo are not supported \
                 ({input_channels} -> {output_channels} channels)"
            ))
            .into());
        }
        if input_channels == 0 || output_channels == 0 {
            return Err(CodecError::Config("channel count must be non-zero".into()).into());
        }
        Ok(if input_channels == output_channels {
            Self::PassThrough
        } else if input_channels < output_channels {
            Self::UpMix
        } else {
            Self::DownMix
        })
    }

    fn apply(self, input: &[i16]) -> Vec<i16> {
        match self {
            Self::PassThrough => input.to_vec(),
            Self::UpMix => {
                let mut output = Vec::with_capacity(input.len() * 2);
                for &sample in input {
                    output.push(sample);
                    output.push(sample);
                }
                output
            }
            Self::DownMix => {
                let mut output = Vec::with_capacity(input.len() / 2);
                for pair in input.chunks_exact(2) {
                    output.push(((pair[0] as i32 + pair[1] as i32) / 2) as i16);
                }
                output
            }
        }
    }
}

#[derive(Debug)]
struct PcmChunk {
    samples: Vec<i16>,
    pts_us: i64,
    consumed_frames: usize,
}

/// Moves PCM between the decoder's native layout and the encoder's required
/// layout.
pub struct AudioBridge {
    input_rate: u32,
    output_rate: u32,
    input_channels: u32,
    output_channels: u32,
    remix: Remix,
    /// Fractional read position of the linear resampler.
    resample_pos: f64,
    /// Previous frame per output channel, for interpolation across windows.
    resample_prev: Vec<i16>,
    queue: VecDeque<PcmChunk>,
    /// A processed window waiting for a free encoder input slot.
    pending_window: Option<(Vec<i16>, i64)>,
    end_of_input: bool,
    fed_eos: bool,
}

impl AudioBridge {
    /// Create a bridge between the given PCM layouts.
    pub fn new(
        input_rate: u32,
        input_channels: u32,
        output_rate: u32,
        output_channels: u32,
    ) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(CodecError::Config("sample rate must be non-zero".into()).into());
        }
        let remix = Remix::choose(input_channels, output_channels)?;
        Ok(Self {
            input_rate,
            output_rate,
            input_channels,
            output_channels,
            remix,
            resample_pos: 0.0,
            resample_prev: vec![0; output_channels as usize],
            queue: VecDeque::new(),
            pending_window: None,
            end_of_input: false,
            fed_eos: false,
        })
    }

    /// Reconfigure the input side after the decoder reported its actual PCM
    /// layout.
    pub fn set_input_format(&mut self, sample_rate: u32, channels: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(CodecError::Config("sample rate must be non-zero".into()).into());
        }
        self.remix = Remix::choose(channels, self.output_channels)?;
        self.input_rate = sample_rate;
        self.input_channels = channels;
        Ok(())
    }

    /// Accept one decoder output buffer of interleaved little-endian i16
    /// PCM.
    pub fn push_pcm(&mut self, data: &[u8], pts_us: i64) {
        let count = data.len() / 2;
        if count == 0 {
            return;
        }
        let mut samples = vec![0i16; count];
        LittleEndian::read_i16_into(&data[..count * 2], &mut samples);
        self.queue.push_back(PcmChunk {
            samples,
            pts_us,
            consumed_frames: 0,
        });
    }

    /// Signal that no further decoder output will arrive.
    pub fn end_of_input(&mut self) {
        self.end_of_input = true;
    }

    /// Whether everything pushed (and the trailing end-of-stream marker) has
    /// been fed to the encoder.
    pub fn is_drained(&self) -> bool {
        self.fed_eos
    }

    /// Feed at most one window into the encoder. Returns true if any work
    /// happened.
    pub fn feed_encoder(&mut self, encoder: &mut dyn CodecUnit) -> Result<bool> {
        if self.fed_eos {
            return Ok(false);
        }

        if let Some((window, pts_us)) = self.pending_window.take() {
            let Some(slot) = encoder.dequeue_input() else {
                self.pending_window = Some((window, pts_us));
                return Ok(false);
            };
            let mut bytes = vec![0u8; window.len() * 2];
            LittleEndian::write_i16_into(&window, &mut bytes);
            encoder.queue_input(slot, &bytes, pts_us, SampleFlags::empty())?;
            return Ok(true);
        }

        if self.queue.is_empty() {
            if !self.end_of_input {
                return Ok(false);
            }
            let Some(slot) = encoder.dequeue_input() else {
                return Ok(false);
            };
            encoder.queue_input(slot, &[], 0, SampleFlags::END_OF_STREAM)?;
            self.fed_eos = true;
            return Ok(true);
        }

        let Some((frames, pts_us)) = self.next_window() else {
            return Ok(false);
        };
        let remixed = self.remix.apply(&frames);
        let window = if self.input_rate == self.output_rate {
            remixed
        } else {
            self.resample(&remixed)
        };
        if !window.is_empty() {
            self.pending_window = Some((window, pts_us));
        }
        // Input was consumed either way.
        Ok(true)
    }

    /// Pull up to one window of interleaved input frames off the queue,
    /// returning them with the presentation time of the first frame.
    fn next_window(&mut self) -> Option<(Vec<i16>, i64)> {
        let channels = self.input_channels as usize;
        let want = WINDOW_FRAMES * channels;
        let mut frames: Vec<i16> = Vec::with_capacity(want);
        let mut pts_us: Option<i64> = None;
        while frames.len() < want {
            let Some(chunk) = self.queue.front_mut() else {
                break;
            };
            if pts_us.is_none() {
                let offset_us = (chunk.consumed_frames as i64).saturating_mul(MICROS_PER_SECOND)
                    / self.input_rate as i64;
                pts_us = Some(chunk.pts_us + offset_us);
            }
            let start = chunk.consumed_frames * channels;
            let available = chunk.samples.len().saturating_sub(start);
            let take = available.min(want - frames.len());
            let take = take - take % channels;
            if take == 0 {
                self.queue.pop_front();
                continue;
            }
            frames.extend_from_slice(&chunk.samples[start..start + take]);
            chunk.consumed_frames += take / channels;
            if chunk.consumed_frames * channels >= chunk.samples.len() {
                self.queue.pop_front();
            }
        }
        pts_us.map(|pts| (frames, pts))
    }

    /// Linear interpolation resampling over interleaved frames, keeping
    /// fractional position and the previous frame across windows.
    fn resample(&mut self, input: &[i16]) -> Vec<i16> {
        let channels = self.output_channels as usize;
        let input_frames = input.len() / channels;
        if input_frames == 0 {
            return Vec::new();
        }
        let ratio = self.input_rate as f64 / self.output_rate as f64;
        let mut output = Vec::with_capacity(
            ((input_frames as f64 / ratio).ceil() as usize).saturating_mul(channels),
        );
        let mut pos = self.resample_pos;
        while (pos as usize) < input_frames {
            let index = pos as usize;
            let frac = (pos - index as f64) as f32;
            for channel in 0..channels {
                let previous = if index > 0 {
                    input[(index - 1) * channels + channel]
                } else {
                    self.resample_prev.get(channel).copied().unwrap_or(0)
                };
                let current = input[index * channels + channel];
                let value = previous as f32 + (current as f32 - previous as f32) * frac;
                output.push(value as i16);
            }
            pos += ratio;
        }
        self.resample_pos = pos - input_frames as f64;
        for channel in 0..channels.min(self.resample_prev.len()) {
            self.resample_prev[channel] = input[(input_frames - 1) * channels + channel];
        }
        output
    }
}
