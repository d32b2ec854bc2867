// Audio clock - Monotonic time derived from frames rendered by the output

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared audio clock
///
/// The audio callback (or offline renderer) is the only writer; it advances
/// the frame count after every block. The scheduler reads it as seconds, so
/// click times and playback positions share one timebase.
#[derive(Clone, Debug)]
pub struct AudioClock {
    /// Frames rendered since the stream started
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Frames rendered so far
    #[inline]
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Advance by one rendered block (called by the renderer only)
    #[inline]
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    /// Current clock time in seconds
    pub fn now_seconds(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }

    /// Convert a clock time to the nearest sample (negative times map to 0)
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate).round().max(0.0) as u64
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}
