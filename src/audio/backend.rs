// Audio backend - Contract between the scheduler and whatever produces sound
//
// The scheduler only ever talks to `AudioBackend`. Each implementation owns
// its clock, so "schedule at time T" and "what time is it" share a timebase:
// - `CpalBackend`: realtime output device (see engine.rs)
// - `OfflineBackend`: renders into memory, clock advanced by the caller
// - `SilentBackend`: no output at all, used when no device can be opened

use crate::sequencer::timeline::ClickCategory;
use std::time::Instant;
use thiserror::Error;

/// A click to be played at an absolute time on the backend clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClick {
    pub category: ClickCategory,
    /// Seconds on the backend clock
    pub time: f64,
}

impl ScheduledClick {
    pub fn new(category: ClickCategory, time: f64) -> Self {
        Self { category, time }
    }
}

/// Backend failures. None of them stop the metronome.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Device configuration error: {0}")]
    DeviceConfig(String),

    #[error("Unsupported sample format: {0}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(String),

    #[error("Failed to build output stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start output stream: {0}")]
    StreamPlay(String),

    #[error("Click queue full, click at {time:.3}s dropped")]
    QueueFull { time: f64 },

    #[error("Audio stream thread is gone")]
    Disconnected,
}

/// Sound output as seen by the scheduler
pub trait AudioBackend {
    /// Queue a click for playback at `click.time`, never "now"
    fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError>;

    /// Monotonic clock in seconds, same timebase as `ScheduledClick::time`
    fn current_clock_time(&self) -> f64;

    /// Unlock/start the output. Idempotent and safe to retry.
    fn resume(&mut self) -> Result<(), BackendError>;

    /// Global output volume in [0, 1], applied after the category gain
    fn set_volume(&mut self, volume: f32);
}

impl<T: AudioBackend + ?Sized> AudioBackend for Box<T> {
    fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError> {
        (**self).schedule_click(click)
    }

    fn current_clock_time(&self) -> f64 {
        (**self).current_clock_time()
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        (**self).resume()
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }
}

/// Backend without an output device
///
/// Keeps time with a monotonic `Instant` so the scheduler (and anything
/// displaying the beat) keeps running when audio is unavailable.
#[derive(Debug)]
pub struct SilentBackend {
    origin: Instant,
    clicks_swallowed: u64,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            clicks_swallowed: 0,
        }
    }

    /// Clicks received and not played
    pub fn clicks_swallowed(&self) -> u64 {
        self.clicks_swallowed
    }
}

impl Default for SilentBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for SilentBackend {
    fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError> {
        log::trace!("silent backend: {:?} at {:.3}s", click.category, click.time);
        self.clicks_swallowed += 1;
        Ok(())
    }

    fn current_clock_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) {}
}
