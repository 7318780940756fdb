//! Energy-based voice activity detection

/// Default RMS threshold; typical room noise stays below it
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.01;

/// Classification of a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDecision {
    /// RMS energy of the frame
    pub energy: f32,
    /// Whether the energy exceeded the threshold
    pub active: bool,
}

/// Stateless RMS energy classifier
///
/// Speaking/silence history is tracked by the endpointer, not here.
#[derive(Debug, Clone, Copy)]
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    /// Create a detector with the given RMS threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Classify a frame of normalized samples
    #[must_use]
    pub fn classify(&self, samples: &[f32]) -> VadDecision {
        let energy = calculate_energy(samples);
        VadDecision {
            energy,
            active: energy > self.threshold,
        }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(DEFAULT_ENERGY_THRESHOLD)
    }
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
