//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};

use super::stt::OPENAI_BASE_URL;
use crate::{Error, Result};

/// Default ElevenLabs API base
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Converts reply text into an encoded audio payload
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the given voice, returning the full payload
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;

    /// Short description for startup logs
    fn describe(&self) -> String;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance against an `OpenAI`-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the public endpoint is used without an API key
    pub fn new_openai(
        api_key: Option<SecretString>,
        base_url: Option<String>,
        model: String,
        speed: f32,
    ) -> Result<Self> {
        let base_url = base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        let has_key = api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty());
        if base_url == OPENAI_BASE_URL && !has_key {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            speed,
            model,
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(
        api_key: Option<SecretString>,
        base_url: Option<String>,
        model: String,
    ) -> Result<Self> {
        let Some(api_key) = api_key.filter(|k| !k.expose_secret().is_empty()) else {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key),
            base_url: base_url
                .unwrap_or_else(|| ELEVENLABS_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        };

        let mut builder = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        collect_body(response).await
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{voice}/stream", self.base_url);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("xi-api-key", key.expose_secret());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        collect_body(response).await
    }
}

/// Drain a streamed audio response to completion
async fn collect_body(response: reqwest::Response) -> Result<Vec<u8>> {
    let mut stream = response.bytes_stream();
    let mut audio = Vec::new();
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        audio.extend_from_slice(&chunk);
        chunks += 1;
    }

    tracing::debug!(chunks, bytes = audio.len(), "audio stream complete");
    Ok(audio)
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text, voice).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, voice).await,
        }
    }

    fn describe(&self) -> String {
        let provider = match self.provider {
            TtsProvider::OpenAI => "openai",
            TtsProvider::ElevenLabs => "elevenlabs",
        };
        format!("{provider}:{} @ {}", self.model, self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_openai_requires_key() {
        let err = TextToSpeech::new_openai(None, None, "tts-1".into(), 1.0);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_elevenlabs_describe() {
        let key = Some(SecretString::from("xi-test".to_string()));
        let tts = TextToSpeech::new_elevenlabs(key, None, "eleven_turbo_v2".into()).unwrap();
        assert_eq!(
            tts.describe(),
            "elevenlabs:eleven_turbo_v2 @ https://api.elevenlabs.io"
        );
    }
}
