//! Turn controller
//!
//! Runs one endpointed utterance through recognition, reply generation,
//! token streaming and synthesis, emitting events in a fixed order:
//!
//! ```text
//! status:processing -> transcript -> latency_stats -> token* -> audio? -> status:idle
//! ```

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;

use super::events::{EventEmitter, OutboundEvent, Status};
use super::responder::ResponseGenerator;
use super::tokens::stream_tokens;
use crate::config::PipelineConfig;
use crate::models::Models;
use crate::voice::Utterance;
use crate::{Error, Result};

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply streamed; `audio` tells whether synthesized speech was sent
    Completed { audio: bool },
    /// No speech recognizer is loaded
    ModelUnavailable,
    /// The recognizer returned an error
    TranscriptionFailed,
    /// Nothing was recognized
    EmptyTranscript,
    /// The client went away mid-turn
    Disconnected,
}

/// Drives turns for one connection
#[derive(Debug, Clone)]
pub struct TurnController {
    config: Arc<PipelineConfig>,
    models: Arc<Models>,
    responder: Arc<ResponseGenerator>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl TurnController {
    /// Create a controller with the default reply table
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, models: Arc<Models>) -> Self {
        Self::with_responder(config, models, Arc::new(ResponseGenerator::default()))
    }

    /// Create a controller with a custom reply table
    #[must_use]
    pub const fn with_responder(
        config: Arc<PipelineConfig>,
        models: Arc<Models>,
        responder: Arc<ResponseGenerator>,
    ) -> Self {
        Self {
            config,
            models,
            responder,
        }
    }

    /// Run one turn, emitting its events through `emitter`
    ///
    /// Never fails: every error is either reported to the client or logged,
    /// and the turn always ends with `status:idle` unless the client left.
    pub async fn run(&self, utterance: Utterance, emitter: &EventEmitter) -> TurnOutcome {
        tracing::info!(
            frames = utterance.frames(),
            duration_secs = utterance.duration_secs(self.config.sample_rate),
            "processing utterance"
        );

        match self.drive(&utterance, emitter).await {
            Ok(outcome) => {
                tracing::debug!(?outcome, "turn finished");
                outcome
            }
            Err(e) => {
                tracing::debug!(error = %e, "turn abandoned");
                TurnOutcome::Disconnected
            }
        }
    }

    async fn drive(&self, utterance: &Utterance, emitter: &EventEmitter) -> Result<TurnOutcome> {
        emitter.status(Status::Processing).await?;

        let Some(transcriber) = self.models.transcriber() else {
            let err = Error::ModelUnavailable("ASR model");
            tracing::warn!(error = %err, "cannot transcribe utterance");
            emitter.error(err.to_string()).await?;
            emitter.status(Status::Idle).await?;
            return Ok(TurnOutcome::ModelUnavailable);
        };

        let asr_start = Instant::now();
        let transcript = match transcriber
            .transcribe(utterance, self.config.sample_rate)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                emitter.error(format!("Transcription failed: {e}")).await?;
                emitter.status(Status::Idle).await?;
                return Ok(TurnOutcome::TranscriptionFailed);
            }
        };
        let asr_latency = elapsed_ms(asr_start);

        let text = transcript.trim();
        if text.is_empty() {
            tracing::debug!(asr_ms = asr_latency, "empty transcript");
            emitter.status(Status::Idle).await?;
            return Ok(TurnOutcome::EmptyTranscript);
        }

        tracing::info!(text, asr_ms = asr_latency, "transcribed");
        emitter
            .emit(OutboundEvent::Transcript {
                text: text.to_string(),
                latency: asr_latency,
            })
            .await?;

        let reply_start = Instant::now();
        let reply = self.responder.generate(text);
        let ttft = elapsed_ms(reply_start);

        emitter
            .emit(OutboundEvent::LatencyStats {
                asr: asr_latency,
                ttft,
            })
            .await?;

        stream_tokens(emitter, &reply, self.config.token_delay).await?;

        let audio = self.synthesize(&reply, emitter).await?;

        emitter.status(Status::Idle).await?;
        Ok(TurnOutcome::Completed { audio })
    }

    /// Synthesize `reply` and send it; failures are logged and skipped
    async fn synthesize(&self, reply: &str, emitter: &EventEmitter) -> Result<bool> {
        let Some(handle) = self.models.synthesis() else {
            tracing::debug!("speech synthesis disabled, skipping audio");
            return Ok(false);
        };

        let tts_start = Instant::now();
        match handle.synthesizer.synthesize(reply, &handle.voice).await {
            Ok(bytes) if bytes.is_empty() => {
                tracing::warn!("synthesizer returned no audio");
                Ok(false)
            }
            Ok(bytes) => {
                tracing::debug!(
                    bytes = bytes.len(),
                    tts_ms = elapsed_ms(tts_start),
                    "synthesized reply"
                );
                let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
                emitter.emit(OutboundEvent::Audio { data }).await?;
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "speech synthesis failed");
                Ok(false)
            }
        }
    }
}
