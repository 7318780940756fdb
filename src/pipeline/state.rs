//! Per-connection audio state

use std::time::Instant;

use crate::config::PipelineConfig;
use crate::voice::{EndpointEvent, Endpointer, EnergyVad, Utterance, ingest_with_report};

/// Frames between energy trace lines
const ENERGY_LOG_INTERVAL: u64 = 10;

/// Phase of a connection as last reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Listening,
    Processing,
}

/// Detection state owned by one connection's receive loop
#[derive(Debug)]
pub struct ConnectionState {
    phase: Phase,
    frames_received: u64,
    vad: EnergyVad,
    endpointer: Endpointer,
}

impl ConnectionState {
    /// Fresh state for a new connection
    #[must_use]
    pub const fn new(config: &PipelineConfig) -> Self {
        Self {
            phase: Phase::Idle,
            frames_received: 0,
            vad: EnergyVad::new(config.energy_threshold),
            endpointer: Endpointer::new(config.silence_limit),
        }
    }

    /// Decode, classify and endpoint one binary frame received at `now`
    pub fn ingest(&mut self, bytes: &[u8], now: Instant) -> EndpointEvent {
        let (samples, dropped) = ingest_with_report(bytes);
        if dropped > 0 {
            tracing::warn!(len = bytes.len(), "odd-length frame, trailing byte dropped");
        }

        self.frames_received += 1;
        let decision = self.vad.classify(&samples);
        if self.frames_received % ENERGY_LOG_INTERVAL == 0 {
            tracing::trace!(
                frame = self.frames_received,
                energy = decision.energy,
                active = decision.active,
                "frame energy"
            );
        }

        self.endpointer.push(samples, decision.active, now)
    }

    /// Mark a turn as started; utterances are held back until it finishes
    pub const fn begin_turn(&mut self) {
        self.phase = Phase::Processing;
        self.endpointer.hold();
    }

    /// Mark the in-flight turn as finished
    ///
    /// Returns an utterance that completed while the turn was running. When
    /// none is ready the phase drops back to idle, or to listening if speech
    /// is still being buffered.
    pub fn finish_turn(&mut self, now: Instant) -> Option<Utterance> {
        let pending = self.endpointer.release(now);
        self.phase = if self.endpointer.is_speaking() {
            Phase::Listening
        } else {
            Phase::Idle
        };
        pending
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Record a phase reported to the client
    pub const fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.phase == Phase::Processing
    }

    /// Frames received since the connection opened
    #[must_use]
    pub const fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Underlying endpointer
    #[must_use]
    pub const fn endpointer(&self) -> &Endpointer {
        &self.endpointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig {
            silence_limit: Duration::from_millis(100),
            ..PipelineConfig::default()
        }
    }

    fn pcm(value: i16, samples: usize) -> Vec<u8> {
        std::iter::repeat_n(value.to_le_bytes(), samples)
            .flatten()
            .collect()
    }

    #[test]
    fn test_quiet_idle_frames_are_dropped() {
        let mut state = ConnectionState::new(&config());
        let now = Instant::now();

        assert_eq!(state.ingest(&pcm(0, 160), now), EndpointEvent::Silence);
        assert_eq!(state.frames_received(), 1);
        assert_eq!(state.endpointer().buffered_frames(), 0);
    }

    #[test]
    fn test_loud_frame_starts_speech() {
        let mut state = ConnectionState::new(&config());
        let event = state.ingest(&pcm(8000, 160), Instant::now());

        assert_eq!(event, EndpointEvent::SpeechStarted);
        assert!(state.endpointer().is_speaking());
    }

    #[test]
    fn test_odd_frame_is_still_classified() {
        let mut state = ConnectionState::new(&config());
        let mut bytes = pcm(8000, 160);
        bytes.push(0x7f);

        assert_eq!(state.ingest(&bytes, Instant::now()), EndpointEvent::SpeechStarted);
        assert_eq!(state.endpointer().buffered()[0].len(), 160);
    }

    #[test]
    fn test_turn_holds_endpoint_until_finished() {
        let mut state = ConnectionState::new(&config());
        let t0 = Instant::now();

        state.begin_turn();
        assert!(state.is_processing());

        state.ingest(&pcm(8000, 160), t0);
        state.ingest(&pcm(0, 160), t0);
        let late = t0 + Duration::from_millis(500);
        assert_eq!(state.ingest(&pcm(0, 160), late), EndpointEvent::Buffered);

        let utterance = state.finish_turn(late).unwrap();
        assert_eq!(utterance.frames(), 3);
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_finish_turn_while_speaking_reports_listening() {
        let mut state = ConnectionState::new(&config());
        let t0 = Instant::now();

        state.begin_turn();
        state.ingest(&pcm(8000, 160), t0);

        assert!(state.finish_turn(t0).is_none());
        assert_eq!(state.phase(), Phase::Listening);
    }
}
