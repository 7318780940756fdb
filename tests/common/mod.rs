//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use murmur_gateway::config::PipelineConfig;
use murmur_gateway::voice::{Synthesizer, Transcriber, Utterance};
use murmur_gateway::{Error, Models, Result, SynthesisHandle};

/// Transcriber that always returns the same text
pub struct FixedTranscriber {
    pub text: String,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self::slow(text, Duration::ZERO)
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            text: text.to_string(),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, utterance: &Utterance, _sample_rate: u32) -> Result<String> {
        assert!(!utterance.is_empty(), "transcriber called without audio");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.text.clone())
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

/// Transcriber that always fails
pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _utterance: &Utterance, _sample_rate: u32) -> Result<String> {
        Err(Error::Stt("decoder exploded".to_string()))
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Synthesizer that returns fixed bytes
pub struct FixedSynthesizer(pub Vec<u8>);

#[async_trait]
impl Synthesizer for FixedSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "fixed".to_string()
    }
}

/// Synthesizer that records how often it was called
#[derive(Default)]
pub struct CountingSynthesizer {
    pub calls: AtomicUsize,
}

impl CountingSynthesizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for CountingSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AUDIO_BYTES.to_vec())
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

/// Synthesizer that always fails
pub struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>> {
        Err(Error::Tts("voice unavailable".to_string()))
    }

    fn describe(&self) -> String {
        "failing".to_string()
    }
}

/// Bytes every [`FixedSynthesizer`] built by [`models`] returns
pub const AUDIO_BYTES: &[u8] = b"ID3\x03fake-mp3";

/// Collaborators built from optional stubs
pub fn models(
    transcriber: Option<Arc<dyn Transcriber>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
) -> Models {
    let synthesis = synthesizer.map(|synthesizer| SynthesisHandle {
        synthesizer,
        voice: "test-voice".to_string(),
    });
    Models::new(transcriber, synthesis)
}

/// Transcriber returning `text` plus a synthesizer returning [`AUDIO_BYTES`]
pub fn echo_models(text: &str) -> Models {
    models(
        Some(Arc::new(FixedTranscriber::new(text))),
        Some(Arc::new(FixedSynthesizer(AUDIO_BYTES.to_vec()))),
    )
}

/// Pipeline parameters with a short silence limit and no token pacing
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        silence_limit: Duration::from_millis(100),
        token_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

/// A frame of `samples` identical 16-bit little-endian samples
pub fn pcm(value: i16, samples: usize) -> Vec<u8> {
    std::iter::repeat_n(value.to_le_bytes(), samples)
        .flatten()
        .collect()
}

/// A 10ms frame well above the default VAD threshold
pub fn loud_frame() -> Vec<u8> {
    pcm(8000, 160)
}

/// A 10ms frame of digital silence
pub fn quiet_frame() -> Vec<u8> {
    pcm(0, 160)
}
