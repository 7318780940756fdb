//! Murmur Gateway - Real-time voice endpoint for conversational assistants
//!
//! This library provides the core functionality for the murmur gateway:
//! - Voice processing (PCM decoding, energy VAD, silence endpointing)
//! - STT/TTS adapters (`OpenAI`-compatible, Deepgram, `ElevenLabs`, local Whisper)
//! - Turn orchestration with streamed replies and latency reporting
//! - A WebSocket server carrying audio in and events out
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Client (browser, CLI, device)             │
//! │      binary PCM frames ▲ JSON events                 │
//! └────────────────────┬────────────────────────────────┘
//!                      │ /ws/audio
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Murmur Gateway                       │
//! │   Frame  │  VAD  │  Endpointer  │  Turn Controller   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Speech collaborators                    │
//! │   STT (Whisper, Deepgram)  │  TTS (OpenAI, 11Labs)   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{Models, Readiness, SynthesisHandle};
