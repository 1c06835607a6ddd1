//! # Squeeze Engine
//!
//! The transcoding engine: orchestrates per-track transcoder state machines
//! against a shared demuxer and a format-barrier-aware muxer.
//!
//! The engine owns exactly one demuxer, one muxer and one track transcoder
//! per track for the duration of a [`TranscoderEngine::transcode`] call. The
//! two track pipelines are interleaved cooperatively on the calling thread;
//! the underlying codec units work asynchronously and are polled without
//! blocking.

pub mod engine;
pub mod location;
pub mod queued;
pub mod status;
pub mod strategy;
pub mod transcode;
pub mod validator;

pub use engine::{EngineConfig, TranscoderEngine, PROGRESS_UNKNOWN};
pub use location::LocationParser;
pub use queued::QueuedMuxer;
pub use status::TrackStatus;
pub use strategy::{OutputStrategy, PassThroughStrategy, RemoveTrackStrategy};
pub use transcode::{
    AudioTrackTranscoder, NoOpTrackTranscoder, PassThroughTrackTranscoder, TrackTranscoder,
    VideoTrackTranscoder,
};
pub use validator::{DefaultValidator, Validator, WriteAlwaysValidator, WriteVideoValidator};
