//! Validators decide whether a transcode should proceed at all, once both
//! track statuses are known and before any codec work begins.

use crate::status::TrackStatus;

/// Decides whether to proceed with a transcode given the classification of
/// both tracks. Pure function, called once per transcode.
pub trait Validator: Send + Sync {
    /// Return true if the transcoding should proceed, false otherwise.
    fn validate(&self, video: TrackStatus, audio: TrackStatus) -> bool;
}

/// The default validator.
///
/// Proceeds if some track is compressing; otherwise proceeds if some track
/// is being removed, since a removal is an intentional action. When every
/// track is absent or passed through, nothing useful would be produced and
/// the transcode is aborted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate(&self, video: TrackStatus, audio: TrackStatus) -> bool {
        if video == TrackStatus::Compressing || audio == TrackStatus::Compressing {
            return true;
        }
        if video == TrackStatus::Removing || audio == TrackStatus::Removing {
            return true;
        }
        false
    }
}

/// A validator that always writes the target file, no matter the track
/// statuses. The output container might be empty or unnecessary.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteAlwaysValidator;

impl Validator for WriteAlwaysValidator {
    fn validate(&self, _video: TrackStatus, _audio: TrackStatus) -> bool {
        true
    }
}

/// A validator that gives priority to the video track. Transcoding will not
/// happen if the video track does not need it, even if the audio track
/// might.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteVideoValidator;

impl Validator for WriteVideoValidator {
    fn validate(&self, video: TrackStatus, _audio: TrackStatus) -> bool {
        match video {
            TrackStatus::Removing | TrackStatus::Compressing => true,
            TrackStatus::Absent | TrackStatus::PassThrough => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::TrackStatus::{Absent, Compressing, PassThrough, Removing};

    const ALL: [TrackStatus; 4] = [Absent, Removing, PassThrough, Compressing];

    #[test]
    fn test_default_validator_table() {
        let validator = DefaultValidator;
        for video in ALL {
            for audio in ALL {
                let expected = video == Compressing
                    || audio == Compressing
                    || video == Removing
                    || audio == Removing;
                assert_eq!(
                    validator.validate(video, audio),
                    expected,
                    "validate({video}, {audio})"
                );
            }
        }
    }

    #[test]
    fn test_write_always_validator() {
        let validator = WriteAlwaysValidator;
        for video in ALL {
            for audio in ALL {
                assert!(validator.validate(video, audio));
            }
        }
    }

    #[test]
    fn test_write_video_validator_ignores_audio() {
        let validator = WriteVideoValidator;
        for audio in ALL {
            assert!(!validator.validate(Absent, audio));
            assert!(!validator.validate(PassThrough, audio));
            assert!(validator.validate(Removing, audio));
            assert!(validator.validate(Compressing, audio));
        }
    }

    #[test]
    fn test_video_priority_disagreement_with_default() {
        // Pass-through video plus compressing audio: the default validator
        // proceeds, the video-priority validator blocks.
        assert!(DefaultValidator.validate(PassThrough, Compressing));
        assert!(!WriteVideoValidator.validate(PassThrough, Compressing));
    }
}
