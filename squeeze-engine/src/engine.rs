//! The transcoder engine.
//!
//! Owns the demuxer, the queued muxer and one track transcoder per track for
//! the duration of a [`TranscoderEngine::transcode`] call, and drives the
//! cooperative step loop until both tracks finish.

use crate::location::LocationParser;
use crate::queued::QueuedMuxer;
use crate::status::TrackStatus;
use crate::strategy::OutputStrategy;
use crate::transcode::{
    AudioTrackTranscoder, NoOpTrackTranscoder, PassThroughTrackTranscoder, TrackTranscoder,
    VideoTrackTranscoder,
};
use crate::validator::Validator;
use squeeze_core::{
    mime, CancelToken, Error, Result, StrategyError, TrackFormat, TrackKind,
};
use squeeze_media::{
    CodecFactory, ContainerMuxer, DataSource, Demuxer, MetadataKey, OutputSink,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Progress value reported when the input duration is unknown.
pub const PROGRESS_UNKNOWN: f64 = -1.0;

/// Sleep between unproductive iterations while the codecs work.
const SLEEP_TO_WAIT_TRANSCODERS: Duration = Duration::from_millis(10);

/// Progress is recomputed every this many loop iterations.
const PROGRESS_INTERVAL_STEPS: u64 = 10;

/// Per-transcode strategy, validation and codec collaborators.
#[derive(Clone)]
pub struct EngineConfig {
    /// Output strategy for the video track.
    pub video_strategy: Arc<dyn OutputStrategy>,
    /// Output strategy for the audio track.
    pub audio_strategy: Arc<dyn OutputStrategy>,
    /// Decides whether the transcode proceeds at all.
    pub validator: Arc<dyn Validator>,
    /// Creates the codec units.
    pub codec_factory: Arc<dyn CodecFactory>,
}

/// How one track will be handled, decided during track setup.
#[derive(Debug, Clone)]
enum TrackPlan {
    /// Absent or removed: nothing to do.
    NoOp,
    /// Copy samples byte-identically.
    PassThrough { index: usize },
    /// Decode and re-encode into the given format.
    Compress { index: usize, output: TrackFormat },
}

impl TrackPlan {
    fn index(&self) -> Option<usize> {
        match self {
            Self::NoOp => None,
            Self::PassThrough { index } | Self::Compress { index, .. } => Some(*index),
        }
    }
}

/// First video and first audio track found in the input.
#[derive(Debug, Default)]
struct FoundTracks {
    video: Option<(usize, TrackFormat)>,
    audio: Option<(usize, TrackFormat)>,
}

/// Performs one transcode, blocking the calling thread for its entire
/// duration.
pub struct TranscoderEngine {
    cancel: CancelToken,
    progress_callback: Option<Box<dyn FnMut(f64) + Send>>,
    progress: f64,
    duration_us: i64,
}

impl Default for TranscoderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscoderEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self {
            cancel: CancelToken::new(),
            progress_callback: None,
            progress: 0.0,
            duration_us: -1,
        }
    }

    /// Attach a cancellation token observed at the loop's suspension point.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Attach a progress observer. Progress is in `[0, 1]`, or negative when
    /// the input duration is unknown.
    pub fn set_progress_callback(&mut self, callback: Box<dyn FnMut(f64) + Send>) {
        self.progress_callback = Some(callback);
    }

    /// Last reported progress value.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Transcode `source` into the container opened from `sink`.
    ///
    /// Every owned resource is released before returning, on success and on
    /// every failure path. Release failures of the codec/demuxer pipeline
    /// are fatal ([`Error::Shutdown`]); release failures confined to the
    /// muxer are logged and swallowed.
    pub fn transcode(
        &mut self,
        source: &mut dyn DataSource,
        sink: &mut dyn OutputSink,
        config: &EngineConfig,
    ) -> Result<()> {
        // One demuxer for both tracks, to keep from reading the source twice.
        let mut demuxer = source.demuxer()?;
        let mut muxer: Option<Box<dyn ContainerMuxer>> = None;
        let mut queued: Option<QueuedMuxer> = None;
        let mut video: Box<dyn TrackTranscoder> = Box::new(NoOpTrackTranscoder::new());
        let mut audio: Box<dyn TrackTranscoder> = Box::new(NoOpTrackTranscoder::new());

        let result = self.run(
            source,
            sink,
            config,
            demuxer.as_mut(),
            &mut muxer,
            &mut queued,
            &mut video,
            &mut audio,
        );

        // Release in fixed order. The codec/demuxer pipeline first: a
        // failure here may have leaked native handles and is too fatal to
        // continue from.
        let shutdown = video
            .release()
            .and_then(|_| audio.release())
            .and_then(|_| demuxer.release());
        if let Err(e) = shutdown {
            error!(error = %e, "could not shut down demuxer and codec pipeline");
            return Err(Error::Shutdown(e.to_string()));
        }
        // The muxer last; nothing further is at risk if this fails.
        let muxer_released = match (queued.as_mut(), muxer.as_deref_mut()) {
            (Some(q), _) => q.release(),
            (None, Some(m)) => m.release(),
            (None, None) => Ok(()),
        };
        if let Err(e) = muxer_released {
            warn!(error = %e, "failed to release muxer");
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        source: &mut dyn DataSource,
        sink: &mut dyn OutputSink,
        config: &EngineConfig,
        demuxer: &mut dyn Demuxer,
        muxer: &mut Option<Box<dyn ContainerMuxer>>,
        queued: &mut Option<QueuedMuxer>,
        video: &mut Box<dyn TrackTranscoder>,
        audio: &mut Box<dyn TrackTranscoder>,
    ) -> Result<()> {
        let raw_muxer = muxer.insert(sink.open()?);
        self.duration_us = self.apply_metadata(source, raw_muxer.as_mut())?;

        // Classify both tracks before touching any codec.
        let found = scan_tracks(demuxer);
        let (video_status, video_plan) =
            classify_track(found.video.as_ref(), config.video_strategy.as_ref())?;
        let (audio_status, audio_plan) =
            classify_track(found.audio.as_ref(), config.audio_strategy.as_ref())?;
        debug!(video = %video_status, audio = %audio_status, "track classification");

        if !config.validator.validate(video_status, audio_status) {
            return Err(Error::Validator("validator returned false".into()));
        }

        let raw_muxer = muxer
            .take()
            .ok_or_else(|| Error::invalid_param("output muxer is not open"))?;
        let queued = queued.insert(QueuedMuxer::new(
            raw_muxer,
            video_status.is_transcoding(),
            audio_status.is_transcoding(),
        ));

        *video = build_transcoder(TrackKind::Video, &video_plan, &config.codec_factory);
        *audio = build_transcoder(TrackKind::Audio, &audio_plan, &config.codec_factory);
        video.setup(demuxer, queued)?;
        audio.setup(demuxer, queued)?;

        if video_status.is_transcoding() {
            if let Some(index) = video_plan.index() {
                demuxer.select_track(index);
            }
        }
        if audio_status.is_transcoding() {
            if let Some(index) = audio_plan.index() {
                demuxer.select_track(index);
            }
        }

        self.run_pipelines(demuxer, queued, video.as_mut(), audio.as_mut(), video_status, audio_status)?;
        queued.stop()?;
        info!("transcode finished");
        Ok(())
    }

    /// Extract rotation, geolocation and duration from the source and write
    /// the container-level metadata. Malformed values degrade, they never
    /// fail: rotation falls back to 0, a bad location is omitted, an unknown
    /// duration becomes -1.
    fn apply_metadata(
        &self,
        source: &mut dyn DataSource,
        muxer: &mut dyn ContainerMuxer,
    ) -> Result<i64> {
        let mut retriever = source.metadata()?;

        let rotation = retriever
            .extract(MetadataKey::Rotation)
            .and_then(|raw| raw.parse::<i32>().ok())
            .unwrap_or(0);
        muxer.set_orientation_hint(rotation);

        if let Some(raw) = retriever.extract(MetadataKey::Location) {
            match LocationParser::new().parse(&raw) {
                Some((latitude, longitude)) => muxer.set_location(latitude, longitude),
                None => debug!("failed to parse location metadata: {raw}"),
            }
        }

        let duration_us = retriever
            .extract(MetadataKey::DurationMillis)
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|millis| millis.saturating_mul(1000))
            .unwrap_or(-1);
        debug!(duration_us, "input duration");

        retriever.release();
        Ok(duration_us)
    }

    fn run_pipelines(
        &mut self,
        demuxer: &mut dyn Demuxer,
        queued: &mut QueuedMuxer,
        video: &mut dyn TrackTranscoder,
        audio: &mut dyn TrackTranscoder,
        video_status: TrackStatus,
        audio_status: TrackStatus,
    ) -> Result<()> {
        let mut loop_count: u64 = 0;
        if self.duration_us <= 0 {
            self.emit_progress(PROGRESS_UNKNOWN);
        }
        while !(video.is_finished() && audio.is_finished()) {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let video_stepped = video.step(demuxer, queued)?;
            let audio_stepped = audio.step(demuxer, queued)?;
            let stepped = video_stepped | audio_stepped;
            loop_count += 1;
            if self.duration_us > 0 && loop_count % PROGRESS_INTERVAL_STEPS == 0 {
                let video_progress = track_progress(video, video_status, self.duration_us);
                let audio_progress = track_progress(audio, audio_status, self.duration_us);
                let denominator = transcoding_count(video_status, audio_status);
                self.emit_progress((video_progress + audio_progress) / denominator as f64);
            }
            if !stepped {
                // Neither codec had data ready; let the hardware work.
                thread::sleep(SLEEP_TO_WAIT_TRANSCODERS);
            }
        }
        Ok(())
    }

    fn emit_progress(&mut self, progress: f64) {
        self.progress = progress;
        if let Some(callback) = self.progress_callback.as_mut() {
            callback(progress);
        }
    }
}

fn track_progress(transcoder: &dyn TrackTranscoder, status: TrackStatus, duration_us: i64) -> f64 {
    if !status.is_transcoding() {
        return 0.0;
    }
    if transcoder.is_finished() {
        return 1.0;
    }
    (transcoder.written_presentation_time_us() as f64 / duration_us as f64).min(1.0)
}

fn transcoding_count(video: TrackStatus, audio: TrackStatus) -> u32 {
    let count = video.is_transcoding() as u32 + audio.is_transcoding() as u32;
    count.max(1)
}

/// Identify the first video and first audio track, stopping once both are
/// found or every track was inspected.
fn scan_tracks(demuxer: &dyn Demuxer) -> FoundTracks {
    let mut found = FoundTracks::default();
    for index in 0..demuxer.track_count() {
        let Some(format) = demuxer.track_format(index) else {
            continue;
        };
        if found.video.is_none() && format.mime.starts_with(mime::VIDEO_PREFIX) {
            found.video = Some((index, format.clone()));
        } else if found.audio.is_none() && format.mime.starts_with(mime::AUDIO_PREFIX) {
            found.audio = Some((index, format.clone()));
        }
        if found.video.is_some() && found.audio.is_some() {
            break;
        }
    }
    found
}

/// Map a strategy outcome onto a track status and execution plan.
///
/// An already-compressed failure falls back to pass-through for this track
/// only, since the other track might still need compression. Any other
/// strategy failure aborts the whole transcode.
fn classify_track(
    found: Option<&(usize, TrackFormat)>,
    strategy: &dyn OutputStrategy,
) -> Result<(TrackStatus, TrackPlan)> {
    let Some((index, input)) = found else {
        return Ok((TrackStatus::Absent, TrackPlan::NoOp));
    };
    match strategy.create_output_format(input) {
        Ok(None) => Ok((TrackStatus::Removing, TrackPlan::NoOp)),
        Ok(Some(output)) if output == *input => Ok((
            TrackStatus::PassThrough,
            TrackPlan::PassThrough { index: *index },
        )),
        Ok(Some(output)) => Ok((
            TrackStatus::Compressing,
            TrackPlan::Compress {
                index: *index,
                output,
            },
        )),
        Err(StrategyError::AlreadyCompressed(message)) => {
            info!("track already compressed, falling back to pass-through: {message}");
            Ok((
                TrackStatus::PassThrough,
                TrackPlan::PassThrough { index: *index },
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn build_transcoder(
    kind: TrackKind,
    plan: &TrackPlan,
    factory: &Arc<dyn CodecFactory>,
) -> Box<dyn TrackTranscoder> {
    match plan {
        TrackPlan::NoOp => Box::new(NoOpTrackTranscoder::new()),
        TrackPlan::PassThrough { index } => {
            Box::new(PassThroughTrackTranscoder::new(Some(*index), kind))
        }
        TrackPlan::Compress { index, output } => match kind {
            TrackKind::Video => Box::new(VideoTrackTranscoder::new(
                *index,
                output.clone(),
                factory.clone(),
            )),
            TrackKind::Audio => Box::new(AudioTrackTranscoder::new(
                *index,
                output.clone(),
                factory.clone(),
            )),
        },
    }
}
