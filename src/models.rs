//! Process-wide speech collaborators
//!
//! Loaded once at startup and shared read-only by every connection. A
//! collaborator that fails to load is left empty instead of aborting the
//! process; turns then report it as unavailable.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;

use crate::config::{Config, SttBackend, SttConfig, TtsBackend};
use crate::voice::{SpeechToText, Synthesizer, TextToSpeech, Transcriber};
use crate::{Error, Result};

/// Load status of a single collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Loaded and usable
    Ready,
    /// Not configured
    Disabled,
    /// Configured but failed to load
    Failed(String),
}

impl Readiness {
    /// Whether the collaborator can be used
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Disabled => f.write_str("disabled"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Synthesis client bound to a voice
#[derive(Clone)]
pub struct SynthesisHandle {
    /// Synthesis backend
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Voice identifier passed on every call
    pub voice: String,
}

impl SynthesisHandle {
    /// Build the synthesis client named by the configuration
    ///
    /// Returns `None` when synthesis is disabled.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is missing credentials
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let tts = &config.tts;
        let synthesizer: Arc<dyn Synthesizer> = match tts.provider {
            TtsBackend::Disabled => return Ok(None),
            TtsBackend::OpenAi => Arc::new(TextToSpeech::new_openai(
                secret(config.api_keys.openai.as_ref()),
                tts.base_url.clone(),
                tts.model.clone(),
                tts.speed,
            )?),
            TtsBackend::ElevenLabs => Arc::new(TextToSpeech::new_elevenlabs(
                secret(config.api_keys.elevenlabs.as_ref()),
                tts.base_url.clone(),
                tts.model.clone(),
            )?),
        };

        Ok(Some(Self {
            synthesizer,
            voice: tts.voice.clone(),
        }))
    }
}

/// Shared collaborators for all connections
#[derive(Clone)]
pub struct Models {
    transcriber: Option<Arc<dyn Transcriber>>,
    synthesis: Option<SynthesisHandle>,
    stt_status: Readiness,
    tts_status: Readiness,
}

impl fmt::Debug for Models {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Models")
            .field("stt", &self.stt_status)
            .field("tts", &self.tts_status)
            .finish_non_exhaustive()
    }
}

impl Models {
    /// Build from already-constructed collaborators
    #[must_use]
    pub fn new(
        transcriber: Option<Arc<dyn Transcriber>>,
        synthesis: Option<SynthesisHandle>,
    ) -> Self {
        let stt_status = if transcriber.is_some() {
            Readiness::Ready
        } else {
            Readiness::Disabled
        };
        let tts_status = if synthesis.is_some() {
            Readiness::Ready
        } else {
            Readiness::Disabled
        };

        Self {
            transcriber,
            synthesis,
            stt_status,
            tts_status,
        }
    }

    /// Load every collaborator named by the configuration
    ///
    /// Never fails; each collaborator's outcome is logged and kept as
    /// [`Readiness`].
    pub async fn load(config: &Config) -> Self {
        tracing::info!("loading speech collaborators");

        let (transcriber, stt_status) = match load_transcriber(&config.stt, config).await {
            Ok(Some(t)) => {
                tracing::info!(backend = %t.describe(), "speech recognition ready");
                (Some(t), Readiness::Ready)
            }
            Ok(None) => {
                tracing::warn!("speech recognition disabled");
                (None, Readiness::Disabled)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load speech recognition");
                (None, Readiness::Failed(e.to_string()))
            }
        };

        let (synthesis, tts_status) = match SynthesisHandle::from_config(config) {
            Ok(Some(s)) => {
                tracing::info!(
                    backend = %s.synthesizer.describe(),
                    voice = %s.voice,
                    "speech synthesis ready"
                );
                (Some(s), Readiness::Ready)
            }
            Ok(None) => {
                tracing::warn!("speech synthesis disabled");
                (None, Readiness::Disabled)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load speech synthesis");
                (None, Readiness::Failed(e.to_string()))
            }
        };

        if stt_status.is_ready() {
            tracing::info!("all models loaded, server ready");
        } else {
            tracing::warn!(
                stt = %stt_status,
                "models failed to load, utterances will be answered with errors"
            );
        }

        Self {
            transcriber,
            synthesis,
            stt_status,
            tts_status,
        }
    }

    /// Speech recognition handle, if loaded
    #[must_use]
    pub fn transcriber(&self) -> Option<&Arc<dyn Transcriber>> {
        self.transcriber.as_ref()
    }

    /// Speech synthesis handle, if loaded
    #[must_use]
    pub const fn synthesis(&self) -> Option<&SynthesisHandle> {
        self.synthesis.as_ref()
    }

    /// Speech recognition load status
    #[must_use]
    pub const fn stt_status(&self) -> &Readiness {
        &self.stt_status
    }

    /// Speech synthesis load status
    #[must_use]
    pub const fn tts_status(&self) -> &Readiness {
        &self.tts_status
    }
}

fn secret(key: Option<&String>) -> Option<SecretString> {
    key.map(|k| SecretString::from(k.clone()))
}

async fn load_transcriber(
    stt: &SttConfig,
    config: &Config,
) -> Result<Option<Arc<dyn Transcriber>>> {
    match stt.provider {
        SttBackend::Disabled => Ok(None),
        SttBackend::OpenAi => {
            let client = SpeechToText::new_whisper(
                secret(config.api_keys.openai.as_ref()),
                stt.base_url.clone(),
                stt.model.clone(),
                stt.language.clone(),
            )?;
            client.probe().await?;
            let transcriber: Arc<dyn Transcriber> = Arc::new(client);
            Ok(Some(transcriber))
        }
        SttBackend::Deepgram => {
            let client = SpeechToText::new_deepgram(
                secret(config.api_keys.deepgram.as_ref()),
                stt.base_url.clone(),
                stt.model.clone(),
                stt.language.clone(),
            )?;
            client.probe().await?;
            let transcriber: Arc<dyn Transcriber> = Arc::new(client);
            Ok(Some(transcriber))
        }
        SttBackend::WhisperLocal => load_local_whisper(stt).await,
    }
}

#[cfg(feature = "whisper-local")]
async fn load_local_whisper(stt: &SttConfig) -> Result<Option<Arc<dyn Transcriber>>> {
    use crate::voice::LocalWhisper;

    let path = LocalWhisper::model_path(&stt.models_dir, &stt.model);
    let use_gpu = stt.use_gpu;
    let language = stt.language.clone();

    tracing::info!(model = %path.display(), use_gpu, "loading whisper model");
    let whisper = tokio::task::spawn_blocking(move || LocalWhisper::load(&path, use_gpu, language))
        .await
        .map_err(|e| Error::Stt(format!("model load task failed: {e}")))??;

    let transcriber: Arc<dyn Transcriber> = Arc::new(whisper);
    Ok(Some(transcriber))
}

#[cfg(not(feature = "whisper-local"))]
#[allow(clippy::unused_async)]
async fn load_local_whisper(_stt: &SttConfig) -> Result<Option<Arc<dyn Transcriber>>> {
    Err(Error::Config(
        "whisper-local provider requires building with --features whisper-local".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::MurmurConfigFile;

    fn config_with(pairs: &[(&'static str, &'static str)]) -> Config {
        let pairs = pairs.to_vec();
        Config::resolve(MurmurConfigFile::default(), move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_disabled_collaborators() {
        let config = config_with(&[("MURMUR_STT_PROVIDER", "none"), ("MURMUR_TTS_PROVIDER", "none")]);
        let models = Models::load(&config).await;

        assert!(models.transcriber().is_none());
        assert!(models.synthesis().is_none());
        assert_eq!(models.stt_status(), &Readiness::Disabled);
        assert_eq!(models.tts_status(), &Readiness::Disabled);
    }

    #[tokio::test]
    async fn test_missing_key_is_a_failed_load_not_a_crash() {
        let config = config_with(&[("MURMUR_TTS_PROVIDER", "none")]);
        let models = Models::load(&config).await;

        assert!(models.transcriber().is_none());
        assert!(matches!(models.stt_status(), Readiness::Failed(_)));
    }

    #[test]
    fn test_readiness_display() {
        assert_eq!(Readiness::Ready.to_string(), "ready");
        assert_eq!(
            Readiness::Failed("boom".to_string()).to_string(),
            "failed: boom"
        );
    }
}
