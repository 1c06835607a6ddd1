//! Asynchronous codec unit capability.
//!
//! A codec unit (typically hardware-accelerated) is modeled as two
//! independent buffer queues, each polled non-blockingly: compressed or raw
//! data is queued on the input side, and results are drained from the output
//! side whenever the codec has them ready. The calling thread never waits on
//! a queue.

use crate::surface::RenderSurface;
use squeeze_core::{Result, SampleFlags, SampleInfo, TrackFormat};

/// Result of one non-blocking output poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPoll {
    /// No output is ready yet.
    Pending,
    /// The output format is now known (or changed); query it with
    /// [`CodecUnit::output_format`] and poll again.
    FormatChanged,
    /// The output buffer set was reallocated; poll again.
    BuffersChanged,
    /// An output buffer is ready.
    Buffer {
        /// Buffer slot index, to be passed to
        /// [`CodecUnit::release_output`].
        index: usize,
        /// Descriptor of the buffer contents.
        info: SampleInfo,
    },
}

/// An asynchronous encoder or decoder.
pub trait CodecUnit: Send {
    /// Start the codec. Queues may be used only after this succeeds.
    fn start(&mut self) -> Result<()>;

    /// Poll for a free input slot. Non-blocking; `None` when the bounded
    /// input queue is full.
    fn dequeue_input(&mut self) -> Option<usize>;

    /// Queue data into a previously dequeued input slot.
    fn queue_input(
        &mut self,
        slot: usize,
        data: &[u8],
        pts_us: i64,
        flags: SampleFlags,
    ) -> Result<()>;

    /// Signal that no more input will arrive. For surface-fed encoders this
    /// replaces queueing an empty end-of-stream buffer.
    fn signal_end_of_input(&mut self) -> Result<()>;

    /// Poll the output queue. Non-blocking.
    fn dequeue_output(&mut self) -> Result<OutputPoll>;

    /// Bytes of a dequeued output buffer.
    fn output_buffer(&self, index: usize) -> &[u8];

    /// The negotiated output format. Valid once
    /// [`OutputPoll::FormatChanged`] was observed.
    fn output_format(&self) -> Result<TrackFormat>;

    /// Return an output buffer to the codec. For a surface-attached decoder,
    /// `render` requests that the frame be made available on the surface.
    fn release_output(&mut self, index: usize, render: bool) -> Result<()>;

    /// Stop the codec.
    fn stop(&mut self) -> Result<()>;

    /// Release the codec and its native resources.
    fn release(&mut self) -> Result<()>;
}

/// A configured decode→surface→encode chain for one video track.
pub struct VideoCodecs {
    /// Decoder configured against the input format, attached to `surface`.
    pub decoder: Box<dyn CodecUnit>,
    /// Encoder configured against the output format, fed from `surface`.
    pub encoder: Box<dyn CodecUnit>,
    /// The shared frame hand-off between the two.
    pub surface: Box<dyn RenderSurface>,
}

/// Creates codec units for the engine.
///
/// The factory hides platform wiring: the video encoder is configured before
/// the decoder so the decoder can be attached to the encoder's input surface.
pub trait CodecFactory: Send + Sync {
    /// Create the decoder/surface/encoder chain for a video track.
    fn video_codecs(&self, input: &TrackFormat, output: &TrackFormat) -> Result<VideoCodecs>;

    /// Create an audio decoder for the input format.
    fn audio_decoder(&self, input: &TrackFormat) -> Result<Box<dyn CodecUnit>>;

    /// Create an audio encoder for the output format.
    fn audio_encoder(&self, output: &TrackFormat) -> Result<Box<dyn CodecUnit>>;
}
