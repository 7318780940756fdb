//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MurmurConfigFile {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// VAD, endpointing and pacing parameters
    #[serde(default)]
    pub pipeline: PipelineFileConfig,

    /// Speech-to-text backend
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech backend
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Listener configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind address
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,
}

/// Pipeline tuning
#[derive(Debug, Default, Deserialize)]
pub struct PipelineFileConfig {
    /// RMS energy threshold for voice activity
    pub vad_threshold: Option<f32>,

    /// Silence (milliseconds) that ends an utterance
    pub silence_limit_ms: Option<u64>,

    /// Sample rate of inbound PCM
    pub sample_rate: Option<u32>,

    /// Delay between streamed reply tokens (milliseconds)
    pub token_delay_ms: Option<u64>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Backend: "openai", "deepgram", "whisper-local" or "none"
    pub provider: Option<String>,

    /// Model identifier (e.g. "whisper-1", "tiny.en")
    pub model: Option<String>,

    /// API base URL override (self-hosted Whisper servers)
    pub base_url: Option<String>,

    /// Spoken language hint
    pub language: Option<String>,

    /// Directory holding GGML models for the local backend
    pub models_dir: Option<String>,

    /// Run local inference on the GPU
    pub use_gpu: Option<bool>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Backend: "openai", "elevenlabs" or "none"
    pub provider: Option<String>,

    /// Model identifier (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,

    /// Speed multiplier
    pub speed: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MurmurConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MurmurConfigFile {
    let Some(path) = config_file_path() else {
        return MurmurConfigFile::default();
    };

    if !path.exists() {
        return MurmurConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            MurmurConfigFile::default()
        }
    }
}

/// Load a TOML config file from an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file_from(path: &Path) -> Result<MurmurConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_parses() {
        let fc: MurmurConfigFile = toml::from_str(
            r#"
            [pipeline]
            silence_limit_ms = 900

            [tts]
            voice = "nova"
            "#,
        )
        .unwrap();

        assert_eq!(fc.pipeline.silence_limit_ms, Some(900));
        assert!(fc.pipeline.vad_threshold.is_none());
        assert_eq!(fc.tts.voice.as_deref(), Some("nova"));
        assert!(fc.server.port.is_none());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100").unwrap();

        let fc = load_config_file_from(file.path()).unwrap();
        assert_eq!(fc.server.port, Some(9100));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let result: std::result::Result<MurmurConfigFile, _> = toml::from_str("[wake_word]\nphrase = \"hey\"");
        assert!(result.is_err());
    }
}
