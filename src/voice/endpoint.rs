//! Utterance buffering and silence-timeout endpointing
//!
//! Frames are accumulated while the speaker is active. Once silence has
//! lasted for the configured wall-clock duration the buffered frames are
//! flushed as a single [`Utterance`].

use std::time::{Duration, Instant};

/// Default wall-clock silence that ends an utterance
pub const DEFAULT_SILENCE_LIMIT: Duration = Duration::from_millis(1500);

/// Endpointer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech; inactive frames are dropped
    Idle,
    /// Speech detected, buffering every frame
    Speaking,
}

/// One contiguous span of buffered speech audio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Utterance {
    samples: Vec<f32>,
    frames: usize,
}

impl Utterance {
    /// Build an utterance from already-concatenated samples
    #[must_use]
    pub const fn new(samples: Vec<f32>, frames: usize) -> Self {
        Self { samples, frames }
    }

    /// Normalized samples in receipt order
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of frames that were concatenated
    #[must_use]
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Whether the utterance holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the given sample rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / sample_rate as f32
    }
}

/// What happened when a frame was pushed
#[derive(Debug, PartialEq)]
pub enum EndpointEvent {
    /// Idle and inactive: the frame was dropped
    Silence,
    /// First active frame after idle; the frame was buffered
    SpeechStarted,
    /// Frame buffered while speaking
    Buffered,
    /// Silence limit reached; the buffered speech is handed over
    Endpoint(Utterance),
}

/// Silence-timeout endpointer
#[derive(Debug)]
pub struct Endpointer {
    silence_limit: Duration,
    state: EndpointState,
    buffer: Vec<Vec<f32>>,
    silence_start: Option<Instant>,
    held: bool,
}

impl Endpointer {
    /// Create an endpointer with the given silence limit
    #[must_use]
    pub const fn new(silence_limit: Duration) -> Self {
        Self {
            silence_limit,
            state: EndpointState::Idle,
            buffer: Vec::new(),
            silence_start: None,
            held: false,
        }
    }

    /// Push one classified frame observed at `now`
    pub fn push(&mut self, frame: Vec<f32>, active: bool, now: Instant) -> EndpointEvent {
        match self.state {
            EndpointState::Idle => {
                if !active {
                    return EndpointEvent::Silence;
                }

                self.state = EndpointState::Speaking;
                self.silence_start = None;
                self.buffer.push(frame);
                tracing::trace!(held = self.held, "speech started");
                EndpointEvent::SpeechStarted
            }
            EndpointState::Speaking => {
                self.buffer.push(frame);

                if active {
                    self.silence_start = None;
                    return EndpointEvent::Buffered;
                }

                let started = *self.silence_start.get_or_insert(now);
                if !self.held && now.duration_since(started) >= self.silence_limit {
                    return EndpointEvent::Endpoint(self.flush());
                }

                EndpointEvent::Buffered
            }
        }
    }

    /// Suppress flushing while a turn is in flight
    ///
    /// Frames keep being buffered under the normal rules.
    pub const fn hold(&mut self) {
        self.held = true;
    }

    /// Allow flushing again
    ///
    /// Returns the pending utterance if the silence limit already elapsed
    /// while the endpointer was held.
    pub fn release(&mut self, now: Instant) -> Option<Utterance> {
        self.held = false;

        let started = self.silence_start?;
        if self.state == EndpointState::Speaking
            && now.duration_since(started) >= self.silence_limit
        {
            return Some(self.flush());
        }

        None
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    /// Whether speech is currently being buffered
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == EndpointState::Speaking
    }

    /// Whether flushing is currently suppressed
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.held
    }

    /// Number of frames currently buffered
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    /// Frames currently buffered, in receipt order
    #[must_use]
    pub fn buffered(&self) -> &[Vec<f32>] {
        &self.buffer
    }

    /// Timestamp of the first inactive frame of the current silence run
    #[must_use]
    pub const fn silence_start(&self) -> Option<Instant> {
        self.silence_start
    }

    fn flush(&mut self) -> Utterance {
        let frames = self.buffer.len();
        let samples = std::mem::take(&mut self.buffer).concat();
        self.state = EndpointState::Idle;
        self.silence_start = None;

        tracing::debug!(frames, samples = samples.len(), "utterance endpointed");
        Utterance::new(samples, frames)
    }
}

impl Default for Endpointer {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_millis(1500);

    fn speech(tag: f32) -> Vec<f32> {
        vec![tag; 4]
    }

    #[test]
    fn test_idle_silence_is_never_buffered() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();

        for i in 0..1000 {
            let now = t0 + Duration::from_millis(i * 20);
            assert_eq!(ep.push(vec![0.0; 4], false, now), EndpointEvent::Silence);
        }

        assert_eq!(ep.buffered_frames(), 0);
        assert_eq!(ep.state(), EndpointState::Idle);
    }

    #[test]
    fn test_first_active_frame_is_buffered() {
        let mut ep = Endpointer::new(LIMIT);
        let event = ep.push(speech(0.5), true, Instant::now());

        assert_eq!(event, EndpointEvent::SpeechStarted);
        assert_eq!(ep.buffered_frames(), 1);
        assert!(ep.is_speaking());
    }

    #[test]
    fn test_short_silence_keeps_every_frame_in_order() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();
        ep.push(speech(1.0), true, t0);

        for i in 1..=10u64 {
            let now = t0 + Duration::from_millis(i * 100);
            #[allow(clippy::cast_precision_loss)]
            let event = ep.push(vec![i as f32 / 1000.0; 4], false, now);
            assert_eq!(event, EndpointEvent::Buffered);
        }

        assert_eq!(ep.buffered_frames(), 11);
        assert!(ep.buffered()[0].iter().all(|s| (*s - 1.0).abs() < f32::EPSILON));
        for (i, frame) in ep.buffered().iter().enumerate().skip(1) {
            #[allow(clippy::cast_precision_loss)]
            let expected = i as f32 / 1000.0;
            assert!((frame[0] - expected).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_silence_timer_measured_from_first_inactive_frame() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();
        ep.push(speech(1.0), true, t0);

        let first_silence = t0 + Duration::from_secs(10);
        ep.push(vec![0.0; 4], false, first_silence);
        assert_eq!(ep.silence_start(), Some(first_silence));

        let almost = first_silence + LIMIT - Duration::from_millis(1);
        assert_eq!(ep.push(vec![0.0; 4], false, almost), EndpointEvent::Buffered);

        let event = ep.push(vec![0.0; 4], false, first_silence + LIMIT);
        match event {
            EndpointEvent::Endpoint(utterance) => {
                assert_eq!(utterance.frames(), 4);
                assert_eq!(utterance.samples().len(), 16);
            }
            other => panic!("expected endpoint, got {other:?}"),
        }
        assert_eq!(ep.state(), EndpointState::Idle);
        assert_eq!(ep.buffered_frames(), 0);
        assert!(ep.silence_start().is_none());
    }

    #[test]
    fn test_active_frame_resets_silence_timer() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();
        ep.push(speech(1.0), true, t0);
        ep.push(vec![0.0; 4], false, t0 + Duration::from_millis(100));
        ep.push(speech(1.0), true, t0 + Duration::from_millis(1000));
        assert!(ep.silence_start().is_none());

        let event = ep.push(vec![0.0; 4], false, t0 + Duration::from_millis(1700));
        assert_eq!(event, EndpointEvent::Buffered);
    }

    #[test]
    fn test_one_flush_per_speech_segment() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();
        let mut flushes = 0;

        ep.push(speech(1.0), true, t0);
        for i in 1..200u64 {
            let now = t0 + Duration::from_millis(i * 20);
            if let EndpointEvent::Endpoint(_) = ep.push(vec![0.0; 4], false, now) {
                flushes += 1;
            }
        }

        assert_eq!(flushes, 1);
    }

    #[test]
    fn test_hold_defers_flush_until_release() {
        let mut ep = Endpointer::new(LIMIT);
        let t0 = Instant::now();
        ep.hold();

        ep.push(speech(1.0), true, t0);
        ep.push(vec![0.0; 4], false, t0 + Duration::from_millis(10));
        let late = t0 + Duration::from_secs(5);
        assert_eq!(ep.push(vec![0.0; 4], false, late), EndpointEvent::Buffered);
        assert_eq!(ep.buffered_frames(), 3);

        let utterance = ep.release(late).expect("pending utterance");
        assert_eq!(utterance.frames(), 3);
        assert!(!ep.is_held());
        assert_eq!(ep.state(), EndpointState::Idle);
    }

    #[test]
    fn test_release_without_pending_speech() {
        let mut ep = Endpointer::new(LIMIT);
        ep.hold();
        assert!(ep.release(Instant::now()).is_none());

        let t0 = Instant::now();
        ep.hold();
        ep.push(speech(1.0), true, t0);
        assert!(ep.release(t0 + Duration::from_secs(5)).is_none());
        assert!(ep.is_speaking());
    }

    #[test]
    fn test_utterance_duration() {
        let utterance = Utterance::new(vec![0.0; 24000], 3);
        assert!((utterance.duration_secs(16000) - 1.5).abs() < f32::EPSILON);
        assert!(utterance.duration_secs(0).abs() < f32::EPSILON);
    }
}
