//! Track format descriptors.
//!
//! A [`TrackFormat`] describes one elementary stream: its mime/codec
//! identifier plus codec-specific attributes. Formats are produced by the
//! demuxer per track and consumed by output strategies and codec
//! configuration.

use std::fmt;

/// Well-known mime identifiers.
pub mod mime {
    /// H.264 / AVC video, the only supported output video codec family.
    pub const VIDEO_AVC: &str = "video/avc";
    /// AAC audio, the only supported output audio codec family.
    pub const AUDIO_AAC: &str = "audio/mp4a-latm";
    /// Raw PCM audio, as produced by audio decoders.
    pub const AUDIO_RAW: &str = "audio/raw";

    /// Prefix shared by all video mime types.
    pub const VIDEO_PREFIX: &str = "video/";
    /// Prefix shared by all audio mime types.
    pub const AUDIO_PREFIX: &str = "audio/";
}

/// Sample/track kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Video track.
    Video,
    /// Audio track.
    Audio,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Video-specific format attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAttributes {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Target bit rate in bits per second.
    pub bit_rate: Option<u32>,
    /// Frame rate in frames per second.
    pub frame_rate: Option<u32>,
    /// Key frame interval in seconds.
    pub i_frame_interval: Option<u32>,
    /// Platform color format identifier.
    pub color_format: Option<u32>,
}

/// Audio-specific format attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAttributes {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channel_count: u32,
    /// Target bit rate in bits per second.
    pub bit_rate: Option<u32>,
}

/// Format of one elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// Mime/codec identifier, e.g. `"video/avc"`.
    pub mime: String,
    /// Video attributes, present for video formats.
    pub video: Option<VideoAttributes>,
    /// Audio attributes, present for audio formats.
    pub audio: Option<AudioAttributes>,
    /// Codec-specific configuration blobs (csd-0, csd-1, ...).
    pub csd: Vec<Vec<u8>>,
    /// Largest sample size in bytes, when the container knows it.
    pub max_input_size: Option<usize>,
}

impl TrackFormat {
    /// Create a video format.
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            mime: mime.into(),
            video: Some(VideoAttributes {
                width,
                height,
                bit_rate: None,
                frame_rate: None,
                i_frame_interval: None,
                color_format: None,
            }),
            audio: None,
            csd: Vec::new(),
            max_input_size: None,
        }
    }

    /// Create an audio format.
    pub fn audio(mime: impl Into<String>, sample_rate: u32, channel_count: u32) -> Self {
        Self {
            mime: mime.into(),
            video: None,
            audio: Some(AudioAttributes {
                sample_rate,
                channel_count,
                bit_rate: None,
            }),
            csd: Vec::new(),
            max_input_size: None,
        }
    }

    /// Set the bit rate on whichever attribute group is present.
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.bit_rate = Some(bit_rate);
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.bit_rate = Some(bit_rate);
        }
        self
    }

    /// Set the video frame rate.
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.frame_rate = Some(frame_rate);
        }
        self
    }

    /// Set the video key frame interval.
    pub fn with_i_frame_interval(mut self, seconds: u32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.i_frame_interval = Some(seconds);
        }
        self
    }

    /// Set the platform color format identifier.
    pub fn with_color_format(mut self, color_format: u32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.color_format = Some(color_format);
        }
        self
    }

    /// Append a codec-specific configuration blob.
    pub fn with_csd(mut self, blob: Vec<u8>) -> Self {
        self.csd.push(blob);
        self
    }

    /// Set the largest-sample-size hint.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = Some(size);
        self
    }

    /// Classify this format by its mime prefix.
    pub fn kind(&self) -> Option<TrackKind> {
        if self.mime.starts_with(mime::VIDEO_PREFIX) {
            Some(TrackKind::Video)
        } else if self.mime.starts_with(mime::AUDIO_PREFIX) {
            Some(TrackKind::Audio)
        } else {
            None
        }
    }

    /// Video width, if this is a video format.
    pub fn width(&self) -> Option<u32> {
        self.video.as_ref().map(|v| v.width)
    }

    /// Video height, if this is a video format.
    pub fn height(&self) -> Option<u32> {
        self.video.as_ref().map(|v| v.height)
    }

    /// Audio sample rate, if this is an audio format.
    pub fn sample_rate(&self) -> Option<u32> {
        self.audio.as_ref().map(|a| a.sample_rate)
    }

    /// Audio channel count, if this is an audio format.
    pub fn channel_count(&self) -> Option<u32> {
        self.audio.as_ref().map(|a| a.channel_count)
    }
}

impl fmt::Display for TrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.video, &self.audio) {
            (Some(v), _) => write!(f, "{} {}x{}", self.mime, v.width, v.height),
            (_, Some(a)) => write!(
                f,
                "{} {} Hz, {} ch",
                self.mime, a.sample_rate, a.channel_count
            ),
            _ => write!(f, "{}", self.mime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime_prefix() {
        assert_eq!(
            TrackFormat::video(mime::VIDEO_AVC, 1920, 1080).kind(),
            Some(TrackKind::Video)
        );
        assert_eq!(
            TrackFormat::audio(mime::AUDIO_AAC, 48000, 2).kind(),
            Some(TrackKind::Audio)
        );
        let odd = TrackFormat {
            mime: "text/vtt".into(),
            video: None,
            audio: None,
            csd: Vec::new(),
            max_input_size: None,
        };
        assert_eq!(odd.kind(), None);
    }

    #[test]
    fn test_equality_is_pass_through_detection() {
        let input = TrackFormat::video(mime::VIDEO_AVC, 1280, 720).with_bit_rate(2_000_000);
        let same = input.clone();
        let different = TrackFormat::video(mime::VIDEO_AVC, 960, 540).with_bit_rate(2_000_000);
        assert_eq!(input, same);
        assert_ne!(input, different);
    }

    #[test]
    fn test_builder_attributes() {
        let format = TrackFormat::video(mime::VIDEO_AVC, 960, 540)
            .with_bit_rate(800_000)
            .with_frame_rate(30)
            .with_i_frame_interval(3);
        let video = format.video.as_ref().unwrap();
        assert_eq!(video.bit_rate, Some(800_000));
        assert_eq!(video.frame_rate, Some(30));
        assert_eq!(video.i_frame_interval, Some(3));
        assert_eq!(format.width(), Some(960));
        assert_eq!(format.sample_rate(), None);
    }
}
