//! Job observation callbacks.

use squeeze_core::Error;

/// Callbacks for one transcode job. At most one listener is active per job;
/// all methods are invoked from the job's worker thread.
pub trait TranscodeListener: Send + Sync {
    /// Progress in `[0, 1]`, or a negative value when the input duration is
    /// unknown.
    fn on_progress(&self, _progress: f64) {}

    /// The transcode completed and the output container is finalized.
    fn on_completed(&self) {}

    /// The transcode was canceled; the output is not usable.
    fn on_canceled(&self) {}

    /// The transcode failed with the given error.
    fn on_failed(&self, _error: &Error) {}
}
