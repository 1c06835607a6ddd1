//! Container muxer capability.

use squeeze_core::{Result, SampleInfo, TrackFormat};

/// Assembles elementary, encoded samples from one or more tracks into an
/// output container.
///
/// Tracks must be added before [`start`](ContainerMuxer::start); samples may
/// only be written between `start` and [`stop`](ContainerMuxer::stop).
/// Container-level metadata must be set before `start`.
pub trait ContainerMuxer: Send {
    /// Set the orientation hint in integer degrees.
    fn set_orientation_hint(&mut self, degrees: i32);

    /// Set the container geolocation.
    fn set_location(&mut self, latitude: f32, longitude: f32);

    /// Register a track and return its index in the output container.
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize>;

    /// Start the muxer. Must be called exactly once, after all tracks are
    /// added.
    fn start(&mut self) -> Result<()>;

    /// Write one sample to the given track.
    fn write_sample(&mut self, track: usize, data: &[u8], info: &SampleInfo) -> Result<()>;

    /// Finalize the container.
    fn stop(&mut self) -> Result<()>;

    /// Release the muxer and its native resources.
    fn release(&mut self) -> Result<()>;
}
