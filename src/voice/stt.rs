//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::endpoint::Utterance;
use super::frame::samples_to_wav;
use crate::{Error, Result};

/// Default `OpenAI`-compatible API base
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Deepgram API base
pub const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Upper bound on the startup reachability check
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Converts a finished utterance to text
///
/// Implementations must not mutate the utterance and may take seconds.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an utterance recorded at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, utterance: &Utterance, sample_rate: u32) -> Result<String>;

    /// Short description for startup logs
    fn describe(&self) -> String;
}

/// Response from an `OpenAI`-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance against an `OpenAI`-compatible endpoint
    ///
    /// Self-hosted Whisper servers may run without a key; the public
    /// `OpenAI` endpoint requires one.
    ///
    /// # Errors
    ///
    /// Returns error if the public endpoint is used without an API key
    pub fn new_whisper(
        api_key: Option<SecretString>,
        base_url: Option<String>,
        model: String,
        language: String,
    ) -> Result<Self> {
        let base_url = base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        let has_key = api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().is_empty());
        if base_url == OPENAI_BASE_URL && !has_key {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            language,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(
        api_key: Option<SecretString>,
        base_url: Option<String>,
        model: String,
        language: String,
    ) -> Result<Self> {
        let Some(api_key) = api_key.filter(|k| !k.expose_secret().is_empty()) else {
            return Err(Error::Config("Deepgram API key required".to_string()));
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key),
            base_url: base_url
                .unwrap_or_else(|| DEEPGRAM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            language,
            provider: SttProvider::Deepgram,
        })
    }

    /// Check that the backend answers at all
    ///
    /// Any HTTP response (even 401/404) counts as reachable; only transport
    /// failures are reported.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint cannot be reached within five seconds
    pub async fn probe(&self) -> Result<()> {
        self.probe_within(PROBE_TIMEOUT).await
    }

    async fn probe_within(&self, timeout: Duration) -> Result<()> {
        let url = match self.provider {
            SttProvider::Whisper => format!("{}/models", self.base_url),
            SttProvider::Deepgram => format!("{}/v1/projects", self.base_url),
        };

        let request = self.client.get(&url).timeout(timeout);
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "STT endpoint unreachable");
            e
        })?;

        tracing::debug!(status = %response.status(), url = %url, "STT endpoint reachable");
        Ok(())
    }

    /// Transcribe WAV bytes
    async fn transcribe_wav(&self, audio: Vec<u8>) -> Result<String> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await,
        }
    }

    /// Transcribe using an `OpenAI`-compatible Whisper endpoint
    async fn transcribe_whisper(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Whisper request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "{}/v1/listen?model={}&language={}&punctuate=true",
            self.base_url, self.model, self.language
        );

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "audio/wav")
            .body(audio);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Token {}", key.expose_secret()));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Deepgram request failed");
            e
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, utterance: &Utterance, sample_rate: u32) -> Result<String> {
        let wav = samples_to_wav(utterance.samples(), sample_rate)?;
        let transcript = self.transcribe_wav(wav).await?;
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn describe(&self) -> String {
        let provider = match self.provider {
            SttProvider::Whisper => "whisper",
            SttProvider::Deepgram => "deepgram",
        };
        format!("{provider}:{} @ {}", self.model, self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_whisper_requires_key() {
        let err = SpeechToText::new_whisper(None, None, "whisper-1".into(), "en".into());
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_self_hosted_whisper_without_key() {
        let stt = SpeechToText::new_whisper(
            None,
            Some("http://localhost:9000/v1/".into()),
            "tiny.en".into(),
            "en".into(),
        )
        .unwrap();
        assert_eq!(stt.describe(), "whisper:tiny.en @ http://localhost:9000/v1");
    }

    #[tokio::test]
    async fn test_probe_gives_up_on_silent_endpoint() {
        // Accepts connections into the backlog but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stt = SpeechToText::new_whisper(
            None,
            Some(format!("http://{addr}/v1")),
            "tiny.en".into(),
            "en".into(),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let result = stt.probe_within(Duration::from_millis(200)).await;

        assert!(matches!(result, Err(Error::Http(ref e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(listener);
    }

    #[test]
    fn test_deepgram_requires_key() {
        let empty = Some(SecretString::from(String::new()));
        let err = SpeechToText::new_deepgram(empty, None, "nova-2".into(), "en".into());
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
