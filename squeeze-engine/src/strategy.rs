//! Output strategy contract.
//!
//! An output strategy computes the desired output format for a track from
//! its input format. Returning the input unchanged means pass-through;
//! returning `None` removes the track; returning a different format requires
//! decode and encode. Strategies must be pure functions of the input format.

use squeeze_core::{StrategyError, TrackFormat};

/// Computes a desired output track format from an input format.
pub trait OutputStrategy: Send + Sync {
    /// Create the output format for `input`, `None` to drop the track, or a
    /// classified [`StrategyError`] when no format can be produced.
    fn create_output_format(
        &self,
        input: &TrackFormat,
    ) -> Result<Option<TrackFormat>, StrategyError>;
}

/// A strategy that copies the track unchanged into the output container.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughStrategy;

impl OutputStrategy for PassThroughStrategy {
    fn create_output_format(
        &self,
        input: &TrackFormat,
    ) -> Result<Option<TrackFormat>, StrategyError> {
        Ok(Some(input.clone()))
    }
}

/// A strategy that removes the track from the output container.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveTrackStrategy;

impl OutputStrategy for RemoveTrackStrategy {
    fn create_output_format(
        &self,
        _input: &TrackFormat,
    ) -> Result<Option<TrackFormat>, StrategyError> {
        Ok(None)
    }
}
