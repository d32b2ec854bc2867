// Offline backend - Renders clicks into memory as fast as the caller wants
//
// Same click pipeline as the realtime engine (ClickBank + ClickMixer) but the
// clock only moves when `advance` is called. Used for WAV export and for
// driving the scheduler deterministically in tests.

use crate::audio::backend::{AudioBackend, BackendError, ScheduledClick};
use crate::audio::timing::AudioClock;
use crate::synth::click::ClickBank;
use crate::synth::mixer::ClickMixer;

/// Frames rendered per internal block
const BLOCK_SIZE: usize = 512;

pub struct OfflineBackend {
    clock: AudioClock,
    mixer: ClickMixer,
    volume: f32,
    block: Vec<f32>,
    rendered: Vec<f32>,
    scheduled: Vec<ScheduledClick>,
    resume_count: u32,
}

impl OfflineBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            clock: AudioClock::new(sample_rate),
            mixer: ClickMixer::new(ClickBank::new(sample_rate)),
            volume: 1.0,
            block: vec![0.0; BLOCK_SIZE],
            rendered: Vec::new(),
            scheduled: Vec::new(),
            resume_count: 0,
        }
    }

    /// Render `frames` samples and move the clock forward
    pub fn advance(&mut self, frames: usize) {
        let mut remaining = frames;
        while remaining > 0 {
            let len = remaining.min(BLOCK_SIZE);
            let block = &mut self.block[..len];
            self.mixer
                .process(block, self.clock.current_sample(), self.volume);
            self.rendered.extend_from_slice(block);
            self.clock.advance(len);
            remaining -= len;
        }
    }

    /// Render `seconds` worth of samples
    pub fn advance_seconds(&mut self, seconds: f64) {
        let frames = self.clock.seconds_to_samples(seconds) as usize;
        self.advance(frames);
    }

    /// Everything rendered so far (mono)
    pub fn rendered(&self) -> &[f32] {
        &self.rendered
    }

    /// Hand over the rendered samples, leaving the buffer empty
    pub fn take_rendered(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.rendered)
    }

    /// Every click received, in arrival order
    pub fn scheduled(&self) -> &[ScheduledClick] {
        &self.scheduled
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    pub fn sample_rate(&self) -> f32 {
        self.clock.sample_rate()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn resume_count(&self) -> u32 {
        self.resume_count
    }
}

impl AudioBackend for OfflineBackend {
    fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError> {
        self.scheduled.push(click);
        let start_sample = self.clock.seconds_to_samples(click.time);
        if self.mixer.trigger(start_sample, click.category) {
            Ok(())
        } else {
            Err(BackendError::QueueFull { time: click.time })
        }
    }

    fn current_clock_time(&self) -> f64 {
        self.clock.now_seconds()
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        self.resume_count += 1;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}
