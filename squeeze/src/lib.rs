//! # Squeeze
//!
//! Selective media transcoding: tracks that exceed a target format are
//! decoded and re-encoded, tracks that already fit are copied byte for byte,
//! and tracks can be dropped entirely.
//!
//! This crate is the public face of the library: build a
//! [`TranscodeOptions`], hand it to a [`TranscodePool`] together with a
//! [`TranscodeListener`], and observe progress/completion through the
//! listener or the returned [`JobHandle`].
//!
//! ```ignore
//! let pool = TranscodePool::with_default_workers();
//! let options = TranscodeOptions::builder()
//!     .source(source)
//!     .sink(sink)
//!     .video_strategy(Arc::new(my_video_strategy))
//!     .audio_strategy(Arc::new(PassThroughStrategy))
//!     .codec_factory(factory)
//!     .build()?;
//! let job = pool.submit(options, Arc::new(MyListener));
//! match job.join() {
//!     JobOutcome::Completed => {}
//!     JobOutcome::Canceled => {}
//!     JobOutcome::Failed(error) => eprintln!("{error}"),
//! }
//! ```

pub mod listener;
pub mod options;
pub mod pool;

pub use listener::TranscodeListener;
pub use options::{TranscodeOptions, TranscodeOptionsBuilder};
pub use pool::{JobHandle, JobOutcome, TranscodePool};

pub use squeeze_core::{
    CancelToken, Error, Result, SampleFlags, SampleInfo, TrackFormat, TrackKind,
};
pub use squeeze_engine::{
    DefaultValidator, OutputStrategy, PassThroughStrategy, RemoveTrackStrategy, TrackStatus,
    Validator, WriteAlwaysValidator, WriteVideoValidator, PROGRESS_UNKNOWN,
};
pub use squeeze_media::{
    CodecFactory, CodecUnit, ContainerMuxer, DataSource, Demuxer, MetadataKey, MetadataRetriever,
    OutputPoll, OutputSink, RenderSurface, VideoCodecs,
};
