//! Voice processing module
//!
//! Handles frame decoding, voice activity detection, endpointing, and the
//! STT/TTS adapters the turn pipeline calls into.

mod endpoint;
mod frame;
mod stt;
mod tts;
mod vad;
#[cfg(feature = "whisper-local")]
mod whisper;

pub use endpoint::{
    DEFAULT_SILENCE_LIMIT, EndpointEvent, EndpointState, Endpointer, Utterance,
};
pub use frame::{SAMPLE_RATE, ingest, ingest_with_report, samples_to_wav};
pub use stt::{DEEPGRAM_BASE_URL, OPENAI_BASE_URL, SpeechToText, Transcriber};
pub use tts::{ELEVENLABS_BASE_URL, Synthesizer, TextToSpeech};
pub use vad::{DEFAULT_ENERGY_THRESHOLD, EnergyVad, VadDecision, calculate_energy};
#[cfg(feature = "whisper-local")]
pub use whisper::LocalWhisper;
