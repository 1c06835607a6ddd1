//! Sample descriptors for encoded media data.
//!
//! A [`SampleInfo`] travels with a byte buffer through the
//! demuxer→codec→muxer path.

use bitflags::bitflags;

bitflags! {
    /// Flags describing a sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SampleFlags: u32 {
        /// This sample is a sync/key frame.
        const KEY_FRAME = 0x0001;
        /// This sample marks the end of the stream.
        const END_OF_STREAM = 0x0002;
    }
}

/// Descriptor for one sample: byte length, presentation timestamp and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Payload length in bytes.
    pub size: usize,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    /// Sample flags.
    pub flags: SampleFlags,
}

impl SampleInfo {
    /// Create a new sample descriptor.
    pub fn new(size: usize, pts_us: i64, flags: SampleFlags) -> Self {
        Self { size, pts_us, flags }
    }

    /// An empty end-of-stream descriptor.
    pub fn end_of_stream() -> Self {
        Self::new(0, 0, SampleFlags::END_OF_STREAM)
    }

    /// Check the end-of-stream flag.
    pub fn is_end_of_stream(&self) -> bool {
        self.flags.contains(SampleFlags::END_OF_STREAM)
    }

    /// Check the key frame flag.
    pub fn is_key_frame(&self) -> bool {
        self.flags.contains(SampleFlags::KEY_FRAME)
    }
}

impl Default for SampleInfo {
    fn default() -> Self {
        Self::new(0, 0, SampleFlags::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_descriptor() {
        let info = SampleInfo::end_of_stream();
        assert_eq!(info.size, 0);
        assert!(info.is_end_of_stream());
        assert!(!info.is_key_frame());
    }

    #[test]
    fn test_flags() {
        let info = SampleInfo::new(100, 33_000, SampleFlags::KEY_FRAME);
        assert!(info.is_key_frame());
        assert!(!info.is_end_of_stream());
    }
}
