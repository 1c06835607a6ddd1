//! Shared rendering surface capability.

use squeeze_core::Result;

/// The decode→encode frame hand-off.
///
/// A surface-attached decoder makes its rendered image available here; the
/// encoder captures that same image when it is published. Platforms with a
/// shared surface transfer frames without a CPU-side pixel copy; an explicit
/// pixel-buffer copy behind this interface is functionally equivalent.
pub trait RenderSurface: Send {
    /// Block until the most recently rendered frame is available. This is a
    /// suspension point: implementations may return
    /// [`squeeze_core::Error::Cancelled`] when interrupted.
    fn await_frame(&mut self) -> Result<()>;

    /// Present the current frame to the encoder input with the given
    /// timestamp in nanoseconds.
    fn publish(&mut self, pts_ns: i64) -> Result<()>;
}
