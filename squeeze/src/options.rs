//! Transcode options.

use squeeze_core::{Error, Result};
use squeeze_engine::{DefaultValidator, EngineConfig, OutputStrategy, Validator};
use squeeze_media::{CodecFactory, DataSource, OutputSink};
use std::sync::Arc;

/// Everything one transcode job needs: the source, the output, the per-track
/// strategies and the codec collaborators.
pub struct TranscodeOptions {
    pub(crate) source: Box<dyn DataSource>,
    pub(crate) sink: Box<dyn OutputSink>,
    pub(crate) video_strategy: Arc<dyn OutputStrategy>,
    pub(crate) audio_strategy: Arc<dyn OutputStrategy>,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) codec_factory: Arc<dyn CodecFactory>,
}

impl TranscodeOptions {
    /// Start building options.
    pub fn builder() -> TranscodeOptionsBuilder {
        TranscodeOptionsBuilder::default()
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            video_strategy: self.video_strategy.clone(),
            audio_strategy: self.audio_strategy.clone(),
            validator: self.validator.clone(),
            codec_factory: self.codec_factory.clone(),
        }
    }
}

/// Builder for [`TranscodeOptions`].
///
/// Source, sink, both strategies and the codec factory are required; the
/// validator defaults to [`DefaultValidator`].
#[derive(Default)]
pub struct TranscodeOptionsBuilder {
    source: Option<Box<dyn DataSource>>,
    sink: Option<Box<dyn OutputSink>>,
    video_strategy: Option<Arc<dyn OutputStrategy>>,
    audio_strategy: Option<Arc<dyn OutputStrategy>>,
    validator: Option<Arc<dyn Validator>>,
    codec_factory: Option<Arc<dyn CodecFactory>>,
}

impl TranscodeOptionsBuilder {
    /// Set the input data source.
    pub fn source(mut self, source: Box<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the output sink.
    pub fn sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the video output strategy.
    pub fn video_strategy(mut self, strategy: Arc<dyn OutputStrategy>) -> Self {
        self.video_strategy = Some(strategy);
        self
    }

    /// Set the audio output strategy.
    pub fn audio_strategy(mut self, strategy: Arc<dyn OutputStrategy>) -> Self {
        self.audio_strategy = Some(strategy);
        self
    }

    /// Set the validator. Defaults to [`DefaultValidator`].
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the codec factory.
    pub fn codec_factory(mut self, factory: Arc<dyn CodecFactory>) -> Self {
        self.codec_factory = Some(factory);
        self
    }

    /// Build the options, failing when a required collaborator is missing.
    pub fn build(self) -> Result<TranscodeOptions> {
        Ok(TranscodeOptions {
            source: self
                .source
                .ok_or_else(|| Error::invalid_param("data source is required"))?,
            sink: self
                .sink
                .ok_or_else(|| Error::invalid_param("output sink is required"))?,
            video_strategy: self
                .video_strategy
                .ok_or_else(|| Error::invalid_param("video strategy is required"))?,
            audio_strategy: self
                .audio_strategy
                .ok_or_else(|| Error::invalid_param("audio strategy is required"))?,
            validator: self.validator.unwrap_or_else(|| Arc::new(DefaultValidator)),
            codec_factory: self
                .codec_factory
                .ok_or_else(|| Error::invalid_param("codec factory is required"))?,
        })
    }
}
