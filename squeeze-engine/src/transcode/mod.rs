//! Track transcoders.
//!
//! One transcoder per track moves samples from the shared demuxer into the
//! queued muxer. Each variant is a small state machine stepped cooperatively
//! by the engine; the codec queues underneath are polled without blocking.

mod audio;
mod audio_bridge;
mod noop;
mod passthrough;
mod video;

pub use audio::AudioTrackTranscoder;
pub use audio_bridge::AudioBridge;
pub use noop::NoOpTrackTranscoder;
pub use passthrough::PassThroughTrackTranscoder;
pub use video::VideoTrackTranscoder;

use crate::queued::QueuedMuxer;
use squeeze_core::{Result, TrackFormat};
use squeeze_media::Demuxer;

/// Result of one drain pass over one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainState {
    /// The stage produced no data.
    None,
    /// A format/buffer-set change event; drain again immediately.
    Retry,
    /// Real data moved through the stage.
    Consumed,
}

/// Shared contract of all track transcoder variants.
pub trait TrackTranscoder {
    /// Prepare codecs and forward any immediately-known output format to the
    /// queued muxer.
    fn setup(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<()>;

    /// The actual output format, once determined by the encoder.
    fn determined_format(&self) -> Option<&TrackFormat>;

    /// Step the pipeline if output is available in any of its stages.
    /// Returns true if data moved.
    fn step(&mut self, demuxer: &mut dyn Demuxer, muxer: &mut QueuedMuxer) -> Result<bool>;

    /// Presentation time of the last sample written to the muxer, in
    /// microseconds. Undefined once finished.
    fn written_presentation_time_us(&self) -> i64;

    /// Whether this track has nothing more to do.
    fn is_finished(&self) -> bool;

    /// Release owned codecs and surfaces.
    fn release(&mut self) -> Result<()>;
}
