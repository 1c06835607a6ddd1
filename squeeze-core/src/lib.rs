//! # Squeeze Core
//!
//! Core types for the squeeze media transcoding library.
//!
//! This crate provides the fundamental building blocks used across all
//! squeeze components:
//! - Error handling types
//! - Track format descriptors
//! - Sample descriptors and flags
//! - Cancellation tokens

pub mod cancel;
pub mod error;
pub mod format;
pub mod sample;

pub use cancel::CancelToken;
pub use error::{CodecError, ContainerError, Error, Result, StrategyError};
pub use format::{mime, AudioAttributes, TrackFormat, TrackKind, VideoAttributes};
pub use sample::{SampleFlags, SampleInfo};
