// Click mixer - Sample-accurate playback of scheduled clicks
// Runs inside the audio callback: no allocations, no locks, no I/O

use crate::sequencer::timeline::ClickCategory;
use crate::synth::click::ClickBank;

/// Clicks waiting for their start sample
const MAX_PENDING: usize = 64;
/// Clicks sounding at the same time (overlaps happen at fast sixteenths)
const MAX_VOICES: usize = 16;

/// A click waiting to start at an absolute sample position
#[derive(Debug, Clone, Copy)]
struct ClickTrigger {
    start_sample: u64,
    category: ClickCategory,
}

/// A click currently sounding
#[derive(Debug, Clone, Copy)]
struct ClickVoice {
    category: ClickCategory,
    position: usize, // Current position in click buffer
}

/// Mixes pre-rendered clicks into output blocks at their exact start sample
///
/// A trigger whose start sample already passed plays from the first sample
/// of the next processed block.
#[derive(Debug, Clone)]
pub struct ClickMixer {
    bank: ClickBank,
    pending: Vec<ClickTrigger>,
    voices: Vec<ClickVoice>,
    dropped: u64,
}

impl ClickMixer {
    pub fn new(bank: ClickBank) -> Self {
        Self {
            bank,
            pending: Vec::with_capacity(MAX_PENDING),
            voices: Vec::with_capacity(MAX_VOICES),
            dropped: 0,
        }
    }

    /// Queue a click. Returns false (and counts a drop) when the queue is full.
    pub fn trigger(&mut self, start_sample: u64, category: ClickCategory) -> bool {
        if self.pending.len() >= MAX_PENDING {
            self.dropped += 1;
            return false;
        }
        self.pending.push(ClickTrigger {
            start_sample,
            category,
        });
        true
    }

    /// Render `output.len()` samples starting at absolute sample `block_start`
    pub fn process(&mut self, output: &mut [f32], block_start: u64, volume: f32) {
        if self.pending.is_empty() && self.voices.is_empty() {
            output.fill(0.0);
            return;
        }

        for (offset, out) in output.iter_mut().enumerate() {
            let now = block_start + offset as u64;
            self.start_due(now);

            let mut sum = 0.0;
            for voice in self.voices.iter_mut() {
                let samples = self.bank.get(voice.category);
                if let Some(sample) = samples.get(voice.position) {
                    sum += sample;
                }
                voice.position += 1;
            }

            let bank = &self.bank;
            self.voices
                .retain(|voice| voice.position < bank.get(voice.category).len());

            *out = (sum * volume).clamp(-1.0, 1.0);
        }
    }

    fn start_due(&mut self, now: u64) {
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].start_sample > now {
                index += 1;
                continue;
            }

            let trigger = self.pending.swap_remove(index);
            if self.voices.len() < MAX_VOICES {
                self.voices.push(ClickVoice {
                    category: trigger.category,
                    position: 0,
                });
            } else {
                self.dropped += 1;
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Clicks lost to a full queue or voice pool
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn bank(&self) -> &ClickBank {
        &self.bank
    }
}
