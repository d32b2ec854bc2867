// Filter - State Variable Filter (Chamberlin), high-pass output
//
// Shapes the noise burst of a click so the transient sits above the tone.
//
// References:
// - Hal Chamberlin's "Musical Applications of Microprocessors" (1985)
// - https://www.earlevel.com/main/2003/03/02/the-digital-state-variable-filter/
//
// Characteristics:
// - 12dB/octave slope (2-pole)
// - Stable up to ~Fs/6 (7.35kHz @ 44.1kHz sample rate)

use std::f32::consts::PI;

/// Butterworth damping
const DEFAULT_Q: f32 = 0.707;

/// 2-pole high-pass built on the Chamberlin state variable topology
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    // State variables
    low: f32,
    band: f32,

    // Coefficients
    f: f32, // Frequency coefficient
    q: f32, // Damping (1/Q)
}

impl HighPassFilter {
    /// Create a high-pass at `cutoff` Hz with Butterworth damping
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        Self::with_resonance(cutoff, DEFAULT_Q, sample_rate)
    }

    /// Create a high-pass with an explicit Q factor
    ///
    /// # Formulas
    /// - `f = 2 * sin(π * fc / Fs)`, cutoff clamped to [20Hz, Fs/6]
    /// - `q = 1 / Q`, Q clamped to [0.5, 20]
    pub fn with_resonance(cutoff: f32, resonance: f32, sample_rate: f32) -> Self {
        let max_cutoff = (sample_rate / 6.0).max(20.0);
        let safe_cutoff = cutoff.clamp(20.0, max_cutoff);

        Self {
            low: 0.0,
            band: 0.0,
            f: 2.0 * (PI * safe_cutoff / sample_rate).sin(),
            q: (1.0 / resonance.clamp(0.5, 20.0)).clamp(0.01, 2.0),
        }
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let high = input - self.low - self.q * self.band;
        self.band += self.f * high;
        self.low += self.f * self.band;
        high
    }
}
