// Click - Percussive click synthesis
// Renders the downbeat/beat/subdivision sounds once so playback is a buffer copy

use crate::sequencer::timeline::ClickCategory;
use crate::synth::filter::HighPassFilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Linear attack time in seconds
const ATTACK_SECONDS: f32 = 0.001;
/// Level the exponential decays land on (Web Audio style ramp target)
const DECAY_FLOOR: f32 = 0.001;
/// Length of the noise transient
const NOISE_SECONDS: f32 = 0.02;
/// Time the noise envelope takes to reach the floor
const NOISE_DECAY_SECONDS: f32 = 0.015;
/// Noise level relative to the category peak gain
const NOISE_GAIN_RATIO: f32 = 0.3;
/// Level of the white noise source itself, before the envelope
const NOISE_SOURCE_LEVEL: f32 = 0.3;

/// Fixed sound parameters of a click category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickParams {
    /// Tone frequency in Hz
    pub frequency: f32,
    /// Tone duration in seconds
    pub duration: f32,
    /// Peak gain (0.0 to 1.0)
    pub gain: f32,
}

impl ClickParams {
    pub fn for_category(category: ClickCategory) -> Self {
        match category {
            ClickCategory::Downbeat => Self {
                frequency: 1000.0,
                duration: 0.05,
                gain: 1.0,
            },
            ClickCategory::Beat => Self {
                frequency: 800.0,
                duration: 0.04,
                gain: 0.7,
            },
            ClickCategory::Subdivision => Self {
                frequency: 600.0,
                duration: 0.03,
                gain: 0.4,
            },
        }
    }
}

/// Exponential ramp from `start` to `end` over `length`, evaluated at `t`
#[inline]
fn exponential_ramp(start: f32, end: f32, t: f32, length: f32) -> f32 {
    start * (end / start).powf(t / length)
}

/// Render one click as mono f32 samples in [-1, 1]
///
/// Sine tone with a 1ms linear attack and exponential decay, summed with a
/// high-passed white noise burst for the transient. The noise is seeded per
/// category so the same sample rate always yields the same buffer.
pub fn render_click(category: ClickCategory, sample_rate: f32) -> Vec<f32> {
    let params = ClickParams::for_category(category);

    let tone_samples = (params.duration * sample_rate).round() as usize;
    let noise_samples = (NOISE_SECONDS * sample_rate).round() as usize;
    let num_samples = tone_samples.max(noise_samples);

    let noise_gain = params.gain * NOISE_GAIN_RATIO;
    let decay_length = params.duration - ATTACK_SECONDS;
    let phase_increment = 2.0 * PI * params.frequency / sample_rate;

    let mut filter = HighPassFilter::new(params.frequency * 2.0, sample_rate);
    let mut rng = StdRng::seed_from_u64(params.frequency as u64);
    let mut samples = Vec::with_capacity(num_samples);

    for i in 0..num_samples {
        let t = i as f32 / sample_rate;

        let tone = if i < tone_samples {
            let envelope = if t < ATTACK_SECONDS {
                params.gain * t / ATTACK_SECONDS
            } else {
                exponential_ramp(params.gain, DECAY_FLOOR, t - ATTACK_SECONDS, decay_length)
            };
            (i as f32 * phase_increment).sin() * envelope
        } else {
            0.0
        };

        let noise = if i < noise_samples {
            let white: f32 = rng.gen_range(-1.0..1.0) * NOISE_SOURCE_LEVEL;
            let envelope = exponential_ramp(noise_gain, DECAY_FLOOR, t, NOISE_DECAY_SECONDS);
            filter.process(white) * envelope
        } else {
            0.0
        };

        samples.push((tone + noise).clamp(-1.0, 1.0));
    }

    samples
}

/// Pre-rendered click buffers for one sample rate
#[derive(Debug, Clone)]
pub struct ClickBank {
    sample_rate: f32,
    downbeat: Vec<f32>,
    beat: Vec<f32>,
    subdivision: Vec<f32>,
}

impl ClickBank {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            downbeat: render_click(ClickCategory::Downbeat, sample_rate),
            beat: render_click(ClickCategory::Beat, sample_rate),
            subdivision: render_click(ClickCategory::Subdivision, sample_rate),
        }
    }

    /// Samples for the given category
    pub fn get(&self, category: ClickCategory) -> &[f32] {
        match category {
            ClickCategory::Downbeat => &self.downbeat,
            ClickCategory::Beat => &self.beat,
            ClickCategory::Subdivision => &self.subdivision,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
