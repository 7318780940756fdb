//! In-process Whisper transcription (`whisper-local` feature)

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use async_trait::async_trait;

use super::endpoint::Utterance;
use super::stt::Transcriber;
use crate::{Error, Result};

static INIT_LOGGING: Once = Once::new();

/// Whisper GGML model held in memory for the lifetime of the process
pub struct LocalWhisper {
    context: Arc<whisper_rs::WhisperContext>,
    model_path: PathBuf,
    language: String,
}

impl LocalWhisper {
    /// Resolve `<models_dir>/ggml-<model>.bin` for a model size like `tiny.en`
    #[must_use]
    pub fn model_path(models_dir: &Path, model: &str) -> PathBuf {
        models_dir.join(format!("ggml-{model}.bin"))
    }

    /// Load a Whisper model from disk
    ///
    /// # Errors
    ///
    /// Returns error if the model file is missing or cannot be loaded
    pub fn load(model_path: &Path, use_gpu: bool, language: String) -> Result<Self> {
        INIT_LOGGING.call_once(|| {
            whisper_rs::install_logging_hooks();
        });

        let path = model_path
            .to_str()
            .ok_or_else(|| Error::Stt(format!("invalid model path: {}", model_path.display())))?;
        if !model_path.exists() {
            return Err(Error::Stt(format!("model file not found: {path}")));
        }

        let mut params = whisper_rs::WhisperContextParameters::default();
        params.use_gpu = use_gpu;

        let context = whisper_rs::WhisperContext::new_with_params(path, params)
            .map_err(|e| Error::Stt(e.to_string()))?;

        tracing::info!(model = %path, use_gpu, "whisper model loaded");

        Ok(Self {
            context: Arc::new(context),
            model_path: model_path.to_path_buf(),
            language,
        })
    }
}

/// Run greedy decoding over 16kHz mono samples
fn run_inference(
    context: &whisper_rs::WhisperContext,
    samples: &[f32],
    language: &str,
) -> Result<String> {
    let mut state = context
        .create_state()
        .map_err(|e| Error::Stt(e.to_string()))?;

    let mut params =
        whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(language));
    params.set_no_context(true);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_special(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| Error::Stt(e.to_string()))?;

    let num_segments = state.full_n_segments();
    let mut text = String::new();
    for i in 0..num_segments {
        if let Some(segment) = state.get_segment(i) {
            text.push_str(&segment.to_string());
            text.push(' ');
        }
    }

    Ok(text.trim().to_string())
}

#[async_trait]
impl Transcriber for LocalWhisper {
    async fn transcribe(&self, utterance: &Utterance, sample_rate: u32) -> Result<String> {
        if sample_rate != super::frame::SAMPLE_RATE {
            return Err(Error::Stt(format!(
                "whisper expects {} Hz audio, got {sample_rate} Hz",
                super::frame::SAMPLE_RATE
            )));
        }

        let context = Arc::clone(&self.context);
        let samples = utterance.samples().to_vec();
        let language = self.language.clone();

        // Inference is CPU-bound; keep it off the async workers
        tokio::task::spawn_blocking(move || run_inference(&context, &samples, &language))
            .await
            .map_err(|e| Error::Stt(format!("whisper task failed: {e}")))?
    }

    fn describe(&self) -> String {
        format!("whisper-local:{}", self.model_path.display())
    }
}
