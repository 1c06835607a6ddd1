//! Engine integration tests.
//!
//! Drives the transcoder engine end to end against mock containers and mock
//! codec units to verify track classification, the format barrier, progress
//! reporting and teardown.

use squeeze_core::{
    mime, CancelToken, Error, Result, SampleFlags, SampleInfo, StrategyError, TrackFormat,
};
use squeeze_engine::{
    DefaultValidator, EngineConfig, OutputStrategy, PassThroughStrategy, QueuedMuxer,
    TrackTranscoder, TranscoderEngine, VideoTrackTranscoder,
};
use squeeze_media::{
    CodecFactory, CodecUnit, ContainerMuxer, DataSource, Demuxer, MetadataKey, MetadataRetriever,
    OutputPoll, OutputSink, RenderSurface, VideoCodecs,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// =============================================================================
// Mock demuxer and data source
// =============================================================================

#[derive(Debug, Clone)]
struct ScriptSample {
    track: usize,
    data: Vec<u8>,
    pts_us: i64,
    key: bool,
}

struct ScriptDemuxer {
    formats: Vec<TrackFormat>,
    samples: Vec<ScriptSample>,
    cursor: usize,
    selected: Vec<bool>,
    released: Arc<AtomicUsize>,
}

impl ScriptDemuxer {
    fn new(
        formats: Vec<TrackFormat>,
        samples: Vec<ScriptSample>,
        released: Arc<AtomicUsize>,
    ) -> Self {
        let selected = vec![false; formats.len()];
        Self {
            formats,
            samples,
            cursor: 0,
            selected,
            released,
        }
    }

    fn skip_unselected(&mut self) {
        while self.cursor < self.samples.len() && !self.selected[self.samples[self.cursor].track] {
            self.cursor += 1;
        }
    }
}

impl Demuxer for ScriptDemuxer {
    fn track_count(&self) -> usize {
        self.formats.len()
    }

    fn track_format(&self, index: usize) -> Option<&TrackFormat> {
        self.formats.get(index)
    }

    fn select_track(&mut self, index: usize) {
        if let Some(slot) = self.selected.get_mut(index) {
            *slot = true;
        }
    }

    fn sample_track_index(&mut self) -> Option<usize> {
        self.skip_unselected();
        self.samples.get(self.cursor).map(|sample| sample.track)
    }

    fn read_sample(&mut self, buf: &mut Vec<u8>) -> Result<SampleInfo> {
        self.skip_unselected();
        let sample = self
            .samples
            .get(self.cursor)
            .ok_or_else(|| Error::invalid_param("no current sample"))?;
        buf.clear();
        buf.extend_from_slice(&sample.data);
        let flags = if sample.key {
            SampleFlags::KEY_FRAME
        } else {
            SampleFlags::empty()
        };
        Ok(SampleInfo::new(sample.data.len(), sample.pts_us, flags))
    }

    fn advance(&mut self) -> bool {
        self.cursor += 1;
        self.skip_unselected();
        self.cursor < self.samples.len()
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MapRetriever {
    values: HashMap<MetadataKey, String>,
}

impl MetadataRetriever for MapRetriever {
    fn extract(&mut self, key: MetadataKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn release(&mut self) {}
}

struct MockSource {
    formats: Vec<TrackFormat>,
    samples: Vec<ScriptSample>,
    metadata: HashMap<MetadataKey, String>,
    demuxer_released: Arc<AtomicUsize>,
    source_released: Arc<AtomicUsize>,
}

impl MockSource {
    fn new(formats: Vec<TrackFormat>, samples: Vec<ScriptSample>) -> Self {
        Self {
            formats,
            samples,
            metadata: HashMap::from([(MetadataKey::DurationMillis, "1000".to_string())]),
            demuxer_released: Arc::new(AtomicUsize::new(0)),
            source_released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn without_duration(mut self) -> Self {
        self.metadata.remove(&MetadataKey::DurationMillis);
        self
    }

    fn with_metadata(mut self, key: MetadataKey, value: &str) -> Self {
        self.metadata.insert(key, value.to_string());
        self
    }
}

impl DataSource for MockSource {
    fn demuxer(&mut self) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(ScriptDemuxer::new(
            self.formats.clone(),
            self.samples.clone(),
            self.demuxer_released.clone(),
        )))
    }

    fn metadata(&mut self) -> Result<Box<dyn MetadataRetriever>> {
        Ok(Box::new(MapRetriever {
            values: self.metadata.clone(),
        }))
    }

    fn release(&mut self) {
        self.source_released.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Mock container muxer
// =============================================================================

#[derive(Debug, Default)]
struct MuxState {
    orientation: Option<i32>,
    location: Option<(f32, f32)>,
    tracks: Vec<TrackFormat>,
    started: bool,
    writes: Vec<(usize, Vec<u8>, SampleInfo)>,
    stopped: bool,
    released: usize,
}

#[derive(Clone, Default)]
struct RecordingMuxer {
    state: Arc<Mutex<MuxState>>,
}

impl ContainerMuxer for RecordingMuxer {
    fn set_orientation_hint(&mut self, degrees: i32) {
        self.state.lock().unwrap().orientation = Some(degrees);
    }

    fn set_location(&mut self, latitude: f32, longitude: f32) {
        self.state.lock().unwrap().location = Some((latitude, longitude));
    }

    fn add_track(&mut self, format: &TrackFormat) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        assert!(!state.started, "tracks must be added before start");
        state.tracks.push(format.clone());
        Ok(state.tracks.len() - 1)
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        assert!(!state.started, "muxer started twice");
        state.started = true;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, data: &[u8], info: &SampleInfo) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        assert!(state.started, "write before start");
        state.writes.push((track, data.to_vec(), *info));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.lock().unwrap().stopped = true;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.state.lock().unwrap().released += 1;
        Ok(())
    }
}

struct RecordingSink {
    state: Arc<Mutex<MuxState>>,
}

impl RecordingSink {
    fn new() -> (Self, Arc<Mutex<MuxState>>) {
        let state = Arc::new(Mutex::new(MuxState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl OutputSink for RecordingSink {
    fn open(&mut self) -> Result<Box<dyn ContainerMuxer>> {
        Ok(Box::new(RecordingMuxer {
            state: self.state.clone(),
        }))
    }
}

// =============================================================================
// Mock codec units
// =============================================================================

/// Video decoder: one output frame per queued compressed sample.
struct MockVideoDecoder {
    frames: Vec<i64>,
    eos_queued: bool,
    eos_emitted: bool,
    released: Arc<AtomicUsize>,
}

impl MockVideoDecoder {
    fn new(released: Arc<AtomicUsize>) -> Self {
        Self {
            frames: Vec::new(),
            eos_queued: false,
            eos_emitted: false,
            released,
        }
    }
}

impl CodecUnit for MockVideoDecoder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dequeue_input(&mut self) -> Option<usize> {
        Some(0)
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        _data: &[u8],
        pts_us: i64,
        flags: SampleFlags,
    ) -> Result<()> {
        if flags.contains(SampleFlags::END_OF_STREAM) {
            self.eos_queued = true;
        } else {
            self.frames.push(pts_us);
        }
        Ok(())
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<OutputPoll> {
        if !self.frames.is_empty() {
            let pts_us = self.frames.remove(0);
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::new(1, pts_us, SampleFlags::empty()),
            });
        }
        if self.eos_queued && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::end_of_stream(),
            });
        }
        Ok(OutputPoll::Pending)
    }

    fn output_buffer(&self, _index: usize) -> &[u8] {
        &[]
    }

    fn output_format(&self) -> Result<TrackFormat> {
        Err(Error::invalid_param("decoder output format not modeled"))
    }

    fn release_output(&mut self, _index: usize, _render: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared surface: frames published by the transcoder land in the encoder's
/// queue.
struct MockSurface {
    published: Arc<Mutex<Vec<i64>>>,
}

impl RenderSurface for MockSurface {
    fn await_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn publish(&mut self, pts_ns: i64) -> Result<()> {
        self.published.lock().unwrap().push(pts_ns);
        Ok(())
    }
}

/// Video encoder: reports its format first, then one output buffer per
/// published frame, then end of stream.
struct MockVideoEncoder {
    frames: Arc<Mutex<Vec<i64>>>,
    consumed: usize,
    format_reported: bool,
    eos_signaled: bool,
    eos_emitted: bool,
    current: Vec<u8>,
    actual_format: TrackFormat,
    released: Arc<AtomicUsize>,
}

impl MockVideoEncoder {
    fn new(
        frames: Arc<Mutex<Vec<i64>>>,
        actual_format: TrackFormat,
        released: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            frames,
            consumed: 0,
            format_reported: false,
            eos_signaled: false,
            eos_emitted: false,
            current: Vec::new(),
            actual_format,
            released,
        }
    }
}

impl CodecUnit for MockVideoEncoder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dequeue_input(&mut self) -> Option<usize> {
        None
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        _data: &[u8],
        _pts_us: i64,
        _flags: SampleFlags,
    ) -> Result<()> {
        Err(Error::invalid_param("surface-fed encoder takes no buffers"))
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.eos_signaled = true;
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<OutputPoll> {
        if !self.format_reported {
            self.format_reported = true;
            return Ok(OutputPoll::FormatChanged);
        }
        let pending = {
            let frames = self.frames.lock().unwrap();
            frames.get(self.consumed).copied()
        };
        if let Some(pts_ns) = pending {
            let first = self.consumed == 0;
            self.consumed += 1;
            self.current = vec![0xAB; 64];
            let flags = if first {
                SampleFlags::KEY_FRAME
            } else {
                SampleFlags::empty()
            };
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::new(self.current.len(), pts_ns / 1000, flags),
            });
        }
        if self.eos_signaled && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::end_of_stream(),
            });
        }
        Ok(OutputPoll::Pending)
    }

    fn output_buffer(&self, _index: usize) -> &[u8] {
        &self.current
    }

    fn output_format(&self) -> Result<TrackFormat> {
        Ok(self.actual_format.clone())
    }

    fn release_output(&mut self, _index: usize, _render: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Audio decoder: one PCM buffer per compressed sample.
struct MockAudioDecoder {
    outputs: Vec<(Vec<u8>, i64)>,
    current: Vec<u8>,
    eos_queued: bool,
    eos_emitted: bool,
    released: Arc<AtomicUsize>,
}

impl MockAudioDecoder {
    fn new(released: Arc<AtomicUsize>) -> Self {
        Self {
            outputs: Vec::new(),
            current: Vec::new(),
            eos_queued: false,
            eos_emitted: false,
            released,
        }
    }
}

impl CodecUnit for MockAudioDecoder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dequeue_input(&mut self) -> Option<usize> {
        Some(0)
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        _data: &[u8],
        pts_us: i64,
        flags: SampleFlags,
    ) -> Result<()> {
        if flags.contains(SampleFlags::END_OF_STREAM) {
            self.eos_queued = true;
        } else {
            // 256 stereo frames of silence per compressed sample.
            self.outputs.push((vec![0u8; 1024], pts_us));
        }
        Ok(())
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<OutputPoll> {
        if !self.outputs.is_empty() {
            let (data, pts_us) = self.outputs.remove(0);
            let size = data.len();
            self.current = data;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::new(size, pts_us, SampleFlags::empty()),
            });
        }
        if self.eos_queued && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::end_of_stream(),
            });
        }
        Ok(OutputPoll::Pending)
    }

    fn output_buffer(&self, _index: usize) -> &[u8] {
        &self.current
    }

    fn output_format(&self) -> Result<TrackFormat> {
        Err(Error::invalid_param("decoder output format not modeled"))
    }

    fn release_output(&mut self, _index: usize, _render: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Audio encoder: one encoded buffer per PCM window.
struct MockAudioEncoder {
    outputs: Vec<(Vec<u8>, i64)>,
    current: Vec<u8>,
    format_reported: bool,
    eos_queued: bool,
    eos_emitted: bool,
    actual_format: TrackFormat,
    released: Arc<AtomicUsize>,
}

impl MockAudioEncoder {
    fn new(actual_format: TrackFormat, released: Arc<AtomicUsize>) -> Self {
        Self {
            outputs: Vec::new(),
            current: Vec::new(),
            format_reported: false,
            eos_queued: false,
            eos_emitted: false,
            actual_format,
            released,
        }
    }
}

impl CodecUnit for MockAudioEncoder {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn dequeue_input(&mut self) -> Option<usize> {
        Some(0)
    }

    fn queue_input(
        &mut self,
        _slot: usize,
        data: &[u8],
        pts_us: i64,
        flags: SampleFlags,
    ) -> Result<()> {
        if flags.contains(SampleFlags::END_OF_STREAM) {
            self.eos_queued = true;
        } else if !data.is_empty() {
            self.outputs.push((vec![0xCD; 32], pts_us));
        }
        Ok(())
    }

    fn signal_end_of_input(&mut self) -> Result<()> {
        self.eos_queued = true;
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<OutputPoll> {
        if !self.format_reported {
            self.format_reported = true;
            return Ok(OutputPoll::FormatChanged);
        }
        if !self.outputs.is_empty() {
            let (data, pts_us) = self.outputs.remove(0);
            let size = data.len();
            self.current = data;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::new(size, pts_us, SampleFlags::empty()),
            });
        }
        if self.eos_queued && !self.eos_emitted {
            self.eos_emitted = true;
            return Ok(OutputPoll::Buffer {
                index: 0,
                info: SampleInfo::end_of_stream(),
            });
        }
        Ok(OutputPoll::Pending)
    }

    fn output_buffer(&self, _index: usize) -> &[u8] {
        &self.current
    }

    fn output_format(&self) -> Result<TrackFormat> {
        Ok(self.actual_format.clone())
    }

    fn release_output(&mut self, _index: usize, _render: bool) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory wiring mock codecs together; tracks a release counter per codec
/// so teardown can be asserted.
#[derive(Default)]
struct MockCodecFactory {
    release_counters: Mutex<Vec<Arc<AtomicUsize>>>,
}

impl MockCodecFactory {
    fn counter(&self) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        self.release_counters.lock().unwrap().push(counter.clone());
        counter
    }

    fn assert_all_released_once(&self) {
        let counters = self.release_counters.lock().unwrap();
        assert!(!counters.is_empty(), "no codecs were created");
        for (index, counter) in counters.iter().enumerate() {
            assert_eq!(
                counter.load(Ordering::SeqCst),
                1,
                "codec {index} release count"
            );
        }
    }
}

impl CodecFactory for MockCodecFactory {
    fn video_codecs(&self, _input: &TrackFormat, output: &TrackFormat) -> Result<VideoCodecs> {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let actual = TrackFormat::video(
            mime::VIDEO_AVC,
            output.width().unwrap_or(0),
            output.height().unwrap_or(0),
        );
        Ok(VideoCodecs {
            decoder: Box::new(MockVideoDecoder::new(self.counter())),
            encoder: Box::new(MockVideoEncoder::new(frames.clone(), actual, self.counter())),
            surface: Box::new(MockSurface { published: frames }),
        })
    }

    fn audio_decoder(&self, _input: &TrackFormat) -> Result<Box<dyn CodecUnit>> {
        Ok(Box::new(MockAudioDecoder::new(self.counter())))
    }

    fn audio_encoder(&self, output: &TrackFormat) -> Result<Box<dyn CodecUnit>> {
        let actual = TrackFormat::audio(
            mime::AUDIO_AAC,
            output.sample_rate().unwrap_or(48000),
            output.channel_count().unwrap_or(2),
        );
        Ok(Box::new(MockAudioEncoder::new(actual, self.counter())))
    }
}

/// Codecs that never make progress, for cancellation tests.
struct StallCodec {
    released: Arc<AtomicUsize>,
}

impl CodecUnit for StallCodec {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }
    fn dequeue_input(&mut self) -> Option<usize> {
        None
    }
    fn queue_input(
        &mut self,
        _slot: usize,
        _data: &[u8],
        _pts_us: i64,
        _flags: SampleFlags,
    ) -> Result<()> {
        Ok(())
    }
    fn signal_end_of_input(&mut self) -> Result<()> {
        Ok(())
    }
    fn dequeue_output(&mut self) -> Result<OutputPoll> {
        Ok(OutputPoll::Pending)
    }
    fn output_buffer(&self, _index: usize) -> &[u8] {
        &[]
    }
    fn output_format(&self) -> Result<TrackFormat> {
        Err(Error::invalid_param("stalled"))
    }
    fn release_output(&mut self, _index: usize, _render: bool) -> Result<()> {
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
    fn release(&mut self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct StallFactory {
    release_counters: Mutex<Vec<Arc<AtomicUsize>>>,
}

impl StallFactory {
    fn counter(&self) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        self.release_counters.lock().unwrap().push(counter.clone());
        counter
    }
}

impl CodecFactory for StallFactory {
    fn video_codecs(&self, _input: &TrackFormat, _output: &TrackFormat) -> Result<VideoCodecs> {
        Ok(VideoCodecs {
            decoder: Box::new(StallCodec {
                released: self.counter(),
            }),
            encoder: Box::new(StallCodec {
                released: self.counter(),
            }),
            surface: Box::new(MockSurface {
                published: Arc::new(Mutex::new(Vec::new())),
            }),
        })
    }

    fn audio_decoder(&self, _input: &TrackFormat) -> Result<Box<dyn CodecUnit>> {
        Ok(Box::new(StallCodec {
            released: self.counter(),
        }))
    }

    fn audio_encoder(&self, _output: &TrackFormat) -> Result<Box<dyn CodecUnit>> {
        Ok(Box::new(StallCodec {
            released: self.counter(),
        }))
    }
}

// =============================================================================
// Test strategies
// =============================================================================

/// Halves both video dimensions.
struct HalveVideoStrategy;

impl OutputStrategy for HalveVideoStrategy {
    fn create_output_format(
        &self,
        input: &TrackFormat,
    ) -> std::result::Result<Option<TrackFormat>, StrategyError> {
        let width = input.width().unwrap_or(0) / 2;
        let height = input.height().unwrap_or(0) / 2;
        Ok(Some(
            TrackFormat::video(mime::VIDEO_AVC, width, height).with_bit_rate(2_000_000),
        ))
    }
}

/// Re-encodes audio at the same layout with a target bit rate.
struct CompressAudioStrategy;

impl OutputStrategy for CompressAudioStrategy {
    fn create_output_format(
        &self,
        input: &TrackFormat,
    ) -> std::result::Result<Option<TrackFormat>, StrategyError> {
        Ok(Some(
            TrackFormat::audio(
                mime::AUDIO_AAC,
                input.sample_rate().unwrap_or(48000),
                input.channel_count().unwrap_or(2),
            )
            .with_bit_rate(96_000),
        ))
    }
}

/// Always refuses because the input is already small enough.
struct AlreadyCompressedStrategy;

impl OutputStrategy for AlreadyCompressedStrategy {
    fn create_output_format(
        &self,
        _input: &TrackFormat,
    ) -> std::result::Result<Option<TrackFormat>, StrategyError> {
        Err(StrategyError::AlreadyCompressed(
            "input is at or below the target size".into(),
        ))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn video_format() -> TrackFormat {
    TrackFormat::video(mime::VIDEO_AVC, 1920, 1080).with_frame_rate(30)
}

fn audio_format() -> TrackFormat {
    TrackFormat::audio(mime::AUDIO_AAC, 44100, 2)
}

fn two_track_samples() -> Vec<ScriptSample> {
    let mut samples = Vec::new();
    for index in 0..20i64 {
        samples.push(ScriptSample {
            track: 0,
            data: vec![0x10 + index as u8; 16],
            pts_us: index * 50_000,
            key: index == 0,
        });
        samples.push(ScriptSample {
            track: 1,
            data: vec![0x60 + index as u8; 8],
            pts_us: index * 50_000,
            key: false,
        });
    }
    samples
}

fn config(
    video: Arc<dyn OutputStrategy>,
    audio: Arc<dyn OutputStrategy>,
    factory: Arc<dyn CodecFactory>,
) -> EngineConfig {
    EngineConfig {
        video_strategy: video,
        audio_strategy: audio,
        validator: Arc::new(DefaultValidator),
        codec_factory: factory,
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_both_tracks_compressing_produces_two_track_output() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples());
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());
    let progress_log = Arc::new(Mutex::new(Vec::new()));

    let mut engine = TranscoderEngine::new();
    let log = progress_log.clone();
    engine.set_progress_callback(Box::new(move |value| log.lock().unwrap().push(value)));

    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(HalveVideoStrategy),
                Arc::new(CompressAudioStrategy),
                factory.clone(),
            ),
        )
        .expect("transcode succeeds");

    let state = state.lock().unwrap();
    assert!(state.started);
    assert!(state.stopped);
    assert_eq!(state.tracks.len(), 2);
    let video_track = state
        .tracks
        .iter()
        .find(|format| format.mime.starts_with("video/"))
        .expect("video track present");
    assert_eq!(video_track.width(), Some(960));
    assert_eq!(video_track.height(), Some(540));
    assert_eq!(state.released, 1);
    assert_eq!(source.demuxer_released.load(Ordering::SeqCst), 1);
    // Releasing the source itself is the caller's job, not the engine's.
    assert_eq!(source.source_released.load(Ordering::SeqCst), 0);
    factory.assert_all_released_once();

    // Progress is non-decreasing and bounded in [0, 1].
    let log = progress_log.lock().unwrap();
    assert!(!log.is_empty());
    for window in log.windows(2) {
        assert!(window[1] >= window[0], "progress went backwards: {log:?}");
    }
    assert!(log.iter().all(|value| (0.0..=1.0).contains(value)));
}

#[test]
fn test_already_compressed_video_falls_back_to_pass_through() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples());
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());

    let mut engine = TranscoderEngine::new();
    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(AlreadyCompressedStrategy),
                Arc::new(CompressAudioStrategy),
                factory,
            ),
        )
        .expect("transcode succeeds");

    let state = state.lock().unwrap();
    assert_eq!(state.tracks.len(), 2);
    // The pass-through video track keeps the input format...
    let video_track = state
        .tracks
        .iter()
        .find(|format| format.mime.starts_with("video/"))
        .expect("video track present");
    assert_eq!(video_track, &video_format());
    // ...and its samples byte-identically, key-frame flag included.
    let video_index = state
        .tracks
        .iter()
        .position(|format| format.mime.starts_with("video/"))
        .unwrap();
    let first_video = state
        .writes
        .iter()
        .find(|(track, _, _)| *track == video_index)
        .expect("video samples written");
    assert_eq!(first_video.1, vec![0x10; 16]);
    assert!(first_video.2.is_key_frame());
}

#[test]
fn test_both_pass_through_aborts_via_default_validator() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples());
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());

    let mut engine = TranscoderEngine::new();
    let result = engine.transcode(
        &mut source,
        &mut sink,
        &config(
            Arc::new(AlreadyCompressedStrategy),
            Arc::new(PassThroughStrategy),
            factory,
        ),
    );

    assert!(matches!(result, Err(Error::Validator(_))));
    let state = state.lock().unwrap();
    assert!(!state.started);
    assert!(state.tracks.is_empty());
    assert_eq!(state.released, 1);
    assert_eq!(source.demuxer_released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_audio_yields_single_track_output() {
    let samples: Vec<ScriptSample> = (0..10i64)
        .map(|index| ScriptSample {
            track: 0,
            data: vec![0x20; 16],
            pts_us: index * 100_000,
            key: index == 0,
        })
        .collect();
    let mut source = MockSource::new(vec![video_format()], samples);
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());

    let mut engine = TranscoderEngine::new();
    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(HalveVideoStrategy),
                Arc::new(CompressAudioStrategy),
                factory,
            ),
        )
        .expect("transcode succeeds");

    // The muxer never waited on an audio format.
    let state = state.lock().unwrap();
    assert!(state.started);
    assert_eq!(state.tracks.len(), 1);
    assert_eq!(state.tracks[0].kind(), Some(squeeze_core::TrackKind::Video));
}

#[test]
fn test_cancellation_is_distinct_and_releases_everything_once() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples());
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(StallFactory::default());

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.cancel();
        })
    };

    let mut engine = TranscoderEngine::new();
    engine.set_cancel_token(token);
    let result = engine.transcode(
        &mut source,
        &mut sink,
        &config(
            Arc::new(HalveVideoStrategy),
            Arc::new(CompressAudioStrategy),
            factory.clone(),
        ),
    );
    canceller.join().expect("canceller thread");

    match result {
        Err(error) => assert!(error.is_cancellation(), "got {error}"),
        Ok(()) => panic!("expected cancellation"),
    }
    assert_eq!(source.demuxer_released.load(Ordering::SeqCst), 1);
    assert_eq!(state.lock().unwrap().released, 1);
    let counters = factory.release_counters.lock().unwrap();
    assert_eq!(counters.len(), 4, "two codecs per track");
    for counter in counters.iter() {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_unknown_duration_emits_single_indeterminate_progress() {
    let mut source =
        MockSource::new(vec![video_format(), audio_format()], two_track_samples()).without_duration();
    let (mut sink, _state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());
    let progress_log = Arc::new(Mutex::new(Vec::new()));

    let mut engine = TranscoderEngine::new();
    let log = progress_log.clone();
    engine.set_progress_callback(Box::new(move |value| log.lock().unwrap().push(value)));

    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(HalveVideoStrategy),
                Arc::new(CompressAudioStrategy),
                factory,
            ),
        )
        .expect("transcode succeeds");

    assert_eq!(*progress_log.lock().unwrap(), vec![-1.0]);
}

#[test]
fn test_container_metadata_is_copied() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples())
        .with_metadata(MetadataKey::Rotation, "90")
        .with_metadata(MetadataKey::Location, "+35.658632+139.745411/");
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());

    let mut engine = TranscoderEngine::new();
    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(HalveVideoStrategy),
                Arc::new(CompressAudioStrategy),
                factory,
            ),
        )
        .expect("transcode succeeds");

    let state = state.lock().unwrap();
    assert_eq!(state.orientation, Some(90));
    let (latitude, longitude) = state.location.expect("location set");
    assert!((latitude - 35.658632).abs() < 1e-4);
    assert!((longitude - 139.745411).abs() < 1e-4);
}

#[test]
fn test_malformed_metadata_degrades_gracefully() {
    let mut source = MockSource::new(vec![video_format(), audio_format()], two_track_samples())
        .with_metadata(MetadataKey::Rotation, "sideways")
        .with_metadata(MetadataKey::Location, "somewhere");
    let (mut sink, state) = RecordingSink::new();
    let factory = Arc::new(MockCodecFactory::default());

    let mut engine = TranscoderEngine::new();
    engine
        .transcode(
            &mut source,
            &mut sink,
            &config(
                Arc::new(HalveVideoStrategy),
                Arc::new(CompressAudioStrategy),
                factory,
            ),
        )
        .expect("transcode succeeds");

    let state = state.lock().unwrap();
    assert_eq!(state.orientation, Some(0));
    assert_eq!(state.location, None);
}

#[test]
fn test_determine_format_pre_phase() {
    let samples: Vec<ScriptSample> = (0..5i64)
        .map(|index| ScriptSample {
            track: 0,
            data: vec![0x30; 16],
            pts_us: index * 100_000,
            key: index == 0,
        })
        .collect();
    let released = Arc::new(AtomicUsize::new(0));
    let mut demuxer = ScriptDemuxer::new(vec![video_format()], samples, released);
    let factory: Arc<dyn CodecFactory> = Arc::new(MockCodecFactory::default());

    let (mut sink, _state) = RecordingSink::new();
    let muxer = sink.open().expect("sink opens");
    let mut queued = QueuedMuxer::new(muxer, true, false);

    let output = TrackFormat::video(mime::VIDEO_AVC, 960, 540);
    let mut transcoder = VideoTrackTranscoder::new(0, output, factory);
    transcoder
        .setup(&mut demuxer, &mut queued)
        .expect("setup succeeds");
    transcoder
        .determine_format(&mut demuxer, &mut queued)
        .expect("format determined");

    let determined = transcoder.determined_format().expect("format known");
    assert_eq!(determined.mime, mime::VIDEO_AVC);
    assert_eq!(determined.width(), Some(960));
    transcoder.release().expect("release succeeds");
}
