//! # Squeeze Media
//!
//! The opaque platform capability seams of the squeeze library, expressed as
//! traits: container demuxing and muxing, metadata retrieval, data sources,
//! asynchronous codec units and the shared rendering surface.
//!
//! Real container and codec implementations live outside this workspace; the
//! engine only ever depends on these contracts.

pub mod codec;
pub mod demux;
pub mod metadata;
pub mod mux;
pub mod source;
pub mod surface;

pub use codec::{CodecFactory, CodecUnit, OutputPoll, VideoCodecs};
pub use demux::Demuxer;
pub use metadata::{MetadataKey, MetadataRetriever};
pub use mux::ContainerMuxer;
pub use source::{DataSource, OutputSink};
pub use surface::RenderSurface;
