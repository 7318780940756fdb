//! Configuration management for the murmur gateway
//!
//! Values resolve as CLI flag > environment > TOML file > default. The
//! resolved [`Config`] is immutable for the lifetime of the process.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use self::file::MurmurConfigFile;
use crate::voice::{DEFAULT_ENERGY_THRESHOLD, DEFAULT_SILENCE_LIMIT, SAMPLE_RATE};
use crate::{Error, Result};

/// Default delay between streamed reply tokens
pub const DEFAULT_TOKEN_DELAY: Duration = Duration::from_millis(50);

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Murmur gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,

    /// Per-connection pipeline parameters
    pub pipeline: PipelineConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

/// Parameters read by every connection's pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// RMS energy above which a frame counts as speech
    pub energy_threshold: f32,

    /// Wall-clock silence that ends an utterance
    pub silence_limit: Duration,

    /// Sample rate of inbound PCM
    pub sample_rate: u32,

    /// Pause between streamed reply tokens
    pub token_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            silence_limit: DEFAULT_SILENCE_LIMIT,
            sample_rate: SAMPLE_RATE,
            token_delay: DEFAULT_TOKEN_DELAY,
        }
    }
}

impl PipelineConfig {
    /// Check that the parameters are usable
    ///
    /// # Errors
    ///
    /// Returns error if any parameter is out of range
    pub fn validate(&self) -> Result<()> {
        if !self.energy_threshold.is_finite() || self.energy_threshold < 0.0 {
            return Err(Error::Config(format!(
                "vad threshold must be a non-negative number, got {}",
                self.energy_threshold
            )));
        }
        if self.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        if self.silence_limit.is_zero() {
            return Err(Error::Config("silence limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// Speech-to-text backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    /// `OpenAI`-compatible `/audio/transcriptions`
    OpenAi,
    /// Deepgram `/v1/listen`
    Deepgram,
    /// In-process Whisper (requires the `whisper-local` feature)
    WhisperLocal,
    /// No transcription; every turn reports the model as unavailable
    Disabled,
}

impl SttBackend {
    const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "whisper-1",
            Self::Deepgram => "nova-2",
            Self::WhisperLocal | Self::Disabled => "tiny.en",
        }
    }
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "whisper" => Ok(Self::OpenAi),
            "deepgram" => Ok(Self::Deepgram),
            "whisper-local" | "local" => Ok(Self::WhisperLocal),
            "none" | "disabled" => Ok(Self::Disabled),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

impl fmt::Display for SttBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Deepgram => "deepgram",
            Self::WhisperLocal => "whisper-local",
            Self::Disabled => "none",
        })
    }
}

/// Text-to-speech backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    /// `OpenAI`-compatible `/audio/speech`
    OpenAi,
    /// ElevenLabs streaming endpoint
    ElevenLabs,
    /// No synthesis; turns complete without audio
    Disabled,
}

impl TtsBackend {
    const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Disabled => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }

    const fn default_voice(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Disabled => "alloy",
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }
}

impl FromStr for TtsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            "none" | "disabled" => Ok(Self::Disabled),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

impl fmt::Display for TtsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::ElevenLabs => "elevenlabs",
            Self::Disabled => "none",
        })
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Backend
    pub provider: SttBackend,

    /// Model identifier (API model name or local model size)
    pub model: String,

    /// API base URL override
    pub base_url: Option<String>,

    /// Spoken language hint
    pub language: String,

    /// Directory holding GGML models for the local backend
    pub models_dir: PathBuf,

    /// Run local inference on the GPU
    pub use_gpu: bool,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Backend
    pub provider: TtsBackend,

    /// Model identifier
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// API base URL override
    pub base_url: Option<String>,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[redacted]");
        f.debug_struct("ApiKeys")
            .field("openai", &redact(&self.openai))
            .field("deepgram", &redact(&self.deepgram))
            .field("elevenlabs", &redact(&self.elevenlabs))
            .finish()
    }
}

/// Values supplied on the command line, applied last
#[derive(Debug, Default)]
pub struct Overrides {
    /// Explicit config file path
    pub config_path: Option<PathBuf>,

    /// Bind address
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,
}

/// Parse an optional environment value
fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}")))
        })
        .transpose()
}

impl Config {
    /// Load configuration from the environment, the config file and CLI overrides
    ///
    /// An explicit `--config` path must load; the default path is best-effort.
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let fc = match &overrides.config_path {
            Some(path) => file::load_config_file_from(path)?,
            None => file::load_config_file(),
        };

        let mut config = Self::resolve(fc, |key| std::env::var(key).ok())?;

        if let Some(host) = &overrides.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            config.server.port = port;
        }

        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is malformed or out of range
    pub fn resolve(fc: MurmurConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Server (env > toml > default)
        let server = ServerConfig {
            host: env("MURMUR_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_env(&env, "MURMUR_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
        };

        // Pipeline (env > toml > default)
        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            energy_threshold: parse_env(&env, "MURMUR_VAD_THRESHOLD")?
                .or(fc.pipeline.vad_threshold)
                .unwrap_or(defaults.energy_threshold),
            silence_limit: parse_env(&env, "MURMUR_SILENCE_LIMIT_MS")?
                .or(fc.pipeline.silence_limit_ms)
                .map_or(defaults.silence_limit, Duration::from_millis),
            sample_rate: parse_env(&env, "MURMUR_SAMPLE_RATE")?
                .or(fc.pipeline.sample_rate)
                .unwrap_or(defaults.sample_rate),
            token_delay: parse_env(&env, "MURMUR_TOKEN_DELAY_MS")?
                .or(fc.pipeline.token_delay_ms)
                .map_or(defaults.token_delay, Duration::from_millis),
        };
        pipeline.validate()?;

        // STT (env > toml > default)
        let stt_provider: SttBackend = match env("MURMUR_STT_PROVIDER").or(fc.stt.provider) {
            Some(raw) => raw.parse()?,
            None => SttBackend::OpenAi,
        };
        let stt = SttConfig {
            provider: stt_provider,
            model: env("MURMUR_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            base_url: env("MURMUR_STT_URL").or(fc.stt.base_url),
            language: fc.stt.language.unwrap_or_else(|| "en".to_string()),
            models_dir: fc
                .stt
                .models_dir
                .map_or_else(|| PathBuf::from("./models"), PathBuf::from),
            use_gpu: fc.stt.use_gpu.unwrap_or(false),
        };

        // TTS (env > toml > default)
        let tts_provider: TtsBackend = match env("MURMUR_TTS_PROVIDER").or(fc.tts.provider) {
            Some(raw) => raw.parse()?,
            None => TtsBackend::OpenAi,
        };
        let tts = TtsConfig {
            provider: tts_provider,
            model: env("MURMUR_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            voice: env("MURMUR_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            base_url: env("MURMUR_TTS_URL").or(fc.tts.base_url),
            speed: fc.tts.speed.unwrap_or(1.0),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        Ok(Self {
            server,
            pipeline,
            stt,
            tts,
            api_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(MurmurConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.silence_limit, Duration::from_millis(1500));
        assert_eq!(config.pipeline.token_delay, Duration::from_millis(50));
        assert_eq!(config.pipeline.sample_rate, 16000);
        assert_eq!(config.stt.provider, SttBackend::OpenAi);
        assert_eq!(config.stt.model, "whisper-1");
        assert_eq!(config.tts.voice, "alloy");
    }

    #[test]
    fn test_env_beats_file() {
        let fc: MurmurConfigFile = toml::from_str(
            "[pipeline]\nsilence_limit_ms = 900\nvad_threshold = 0.05\n[server]\nport = 9000",
        )
        .unwrap();
        let env = env_from(&[("MURMUR_SILENCE_LIMIT_MS", "700"), ("MURMUR_PORT", "9001")]);

        let config = Config::resolve(fc, env).unwrap();
        assert_eq!(config.pipeline.silence_limit, Duration::from_millis(700));
        assert!((config.pipeline.energy_threshold - 0.05).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn test_provider_defaults_follow_backend() {
        let env = env_from(&[
            ("MURMUR_STT_PROVIDER", "whisper-local"),
            ("MURMUR_TTS_PROVIDER", "ElevenLabs"),
        ]);
        let config = Config::resolve(MurmurConfigFile::default(), env).unwrap();

        assert_eq!(config.stt.provider, SttBackend::WhisperLocal);
        assert_eq!(config.stt.model, "tiny.en");
        assert_eq!(config.tts.provider, TtsBackend::ElevenLabs);
        assert_eq!(config.tts.model, "eleven_monolingual_v1");
    }

    #[test]
    fn test_malformed_env_is_rejected() {
        let env = env_from(&[("MURMUR_VAD_THRESHOLD", "loud")]);
        let err = Config::resolve(MurmurConfigFile::default(), env).unwrap_err();
        assert!(err.to_string().contains("MURMUR_VAD_THRESHOLD"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let env = env_from(&[("MURMUR_STT_PROVIDER", "carrier-pigeon")]);
        assert!(Config::resolve(MurmurConfigFile::default(), env).is_err());
    }

    #[test]
    fn test_pipeline_validation() {
        let negative = PipelineConfig {
            energy_threshold: -0.1,
            ..PipelineConfig::default()
        };
        assert!(negative.validate().is_err());

        let no_rate = PipelineConfig {
            sample_rate: 0,
            ..PipelineConfig::default()
        };
        assert!(no_rate.validate().is_err());

        let no_silence = PipelineConfig {
            silence_limit: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(no_silence.validate().is_err());
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug() {
        let keys = ApiKeys {
            openai: Some("sk-secret".to_string()),
            ..ApiKeys::default()
        };
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
