// Transport - Playback control and state management
// Owns the metronome configuration and runs the scheduler while playing

use super::scheduler::LookaheadScheduler;
use super::settings::{MetronomeSettings, MuteEvery, SettingsCallback};
use super::tap_tempo::TapTempo;
use super::timeline::{SubdivisionKind, TimeSignature, clamp_bpm};
use super::timer::RepeatingTimer;
use crate::audio::backend::{AudioBackend, SilentBackend};
use crate::audio::parameters::{AtomicF32, clamp_volume};
use crate::config::EngineConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

/// Read-only view of the transport for displays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub bpm: u32,
    pub time_signature: TimeSignature,
    pub subdivision: SubdivisionKind,
    pub is_playing: bool,
    pub current_beat: u32,
    pub current_subdivision: u32,
    pub volume: f32,
    pub subdivision_count: u32,
    pub mute_every: MuteEvery,
}

/// Shared transport state
/// Thread-safe via atomics: the scheduler reads configuration live and
/// publishes its position, displays read everything without locking.
/// Compound values (time signature, position) live in a single word so a
/// reader never sees half of an update.
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    bpm: AtomicU32,
    time_signature: AtomicU64,
    subdivision: AtomicU8,
    volume: AtomicF32,
    mute_every: AtomicU8,
    position: AtomicU64, // beat << 32 | subdivision
}

impl SharedTransportState {
    pub fn new(settings: &MetronomeSettings) -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(false),
            bpm: AtomicU32::new(clamp_bpm(settings.bpm as f64).unwrap_or(120)),
            time_signature: AtomicU64::new(settings.time_signature.to_bits()),
            subdivision: AtomicU8::new(settings.subdivision.to_u8()),
            volume: AtomicF32::new(clamp_volume(settings.volume).unwrap_or(0.7)),
            mute_every: AtomicU8::new(settings.mute_every.period()),
            position: AtomicU64::new(0),
        })
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn state(&self) -> TransportState {
        if self.is_playing() {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Relaxed)
    }

    pub fn time_signature(&self) -> TimeSignature {
        TimeSignature::from_bits(self.time_signature.load(Ordering::Relaxed))
    }

    pub fn subdivision(&self) -> SubdivisionKind {
        SubdivisionKind::from_u8(self.subdivision.load(Ordering::Relaxed))
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub fn mute_every(&self) -> MuteEvery {
        MuteEvery::from(self.mute_every.load(Ordering::Relaxed))
    }

    /// (beat, subdivision) of the most recently scheduled click
    pub fn position(&self) -> (u32, u32) {
        let packed = self.position.load(Ordering::Relaxed);
        ((packed >> 32) as u32, packed as u32)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn set_bpm(&self, bpm: u32) {
        self.bpm.store(bpm, Ordering::Relaxed);
    }

    pub(crate) fn set_time_signature(&self, time_signature: TimeSignature) {
        self.time_signature
            .store(time_signature.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn set_subdivision(&self, subdivision: SubdivisionKind) {
        self.subdivision
            .store(subdivision.to_u8(), Ordering::Relaxed);
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        self.volume.store(volume);
    }

    pub(crate) fn set_mute_every(&self, mute_every: MuteEvery) {
        self.mute_every
            .store(mute_every.period(), Ordering::Relaxed);
    }

    pub(crate) fn publish_position(&self, beat: u32, subdivision: u32) {
        let packed = ((beat as u64) << 32) | subdivision as u64;
        self.position.store(packed, Ordering::Relaxed);
    }

    /// Pull the published position back inside the current bar after the
    /// signature or subdivision shrank
    pub(crate) fn clamp_position(&self) {
        let (beat, subdivision) = self.position();
        let last_beat = self.time_signature().beats.saturating_sub(1);
        let last_subdivision = self.subdivision().count().saturating_sub(1);
        self.publish_position(beat.min(last_beat), subdivision.min(last_subdivision));
    }

    pub fn settings(&self) -> MetronomeSettings {
        MetronomeSettings {
            bpm: self.bpm(),
            time_signature: self.time_signature(),
            subdivision: self.subdivision(),
            volume: self.volume(),
            mute_every: self.mute_every(),
        }
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        let (current_beat, current_subdivision) = self.position();
        let subdivision = self.subdivision();
        TransportSnapshot {
            bpm: self.bpm(),
            time_signature: self.time_signature(),
            subdivision,
            is_playing: self.is_playing(),
            current_beat,
            current_subdivision,
            volume: self.volume(),
            subdivision_count: subdivision.count(),
            mute_every: self.mute_every(),
        }
    }
}

/// Scheduler and backend, locked together for the duration of a poll
struct Engine<B> {
    scheduler: LookaheadScheduler,
    backend: B,
    // Set while the backend failed to resume; its clock may not be moving
    fallback: Option<SilentBackend>,
}

impl<B: AudioBackend> Engine<B> {
    fn clock_time(&self) -> f64 {
        match &self.fallback {
            Some(silent) => silent.current_clock_time(),
            None => self.backend.current_clock_time(),
        }
    }

    fn poll(&mut self, shared: &SharedTransportState) -> usize {
        let now = self.clock_time();
        match self.fallback.as_mut() {
            Some(silent) => self.scheduler.poll(now, shared, silent),
            None => self.scheduler.poll(now, shared, &mut self.backend),
        }
    }
}

/// Transport controller
/// The metronome's public face: play state machine, live configuration,
/// tap tempo and the settings-changed notification.
///
/// Mutators may be called while playing; changes reach the scheduler at the
/// next interval it computes. Position is only reset by start/stop.
pub struct Transport<B, T> {
    shared: Arc<SharedTransportState>,
    engine: Arc<Mutex<Engine<B>>>,
    timer: T,
    tap: TapTempo,
    config: EngineConfig,
    on_settings_changed: Option<SettingsCallback>,
}

impl<B, T> Transport<B, T>
where
    B: AudioBackend + Send + 'static,
    T: RepeatingTimer,
{
    /// Create a stopped transport. Invalid config fields fall back to
    /// their defaults.
    pub fn new(
        mut backend: B,
        timer: T,
        config: EngineConfig,
        settings: MetronomeSettings,
    ) -> Self {
        let config = config.sanitized();
        let shared = SharedTransportState::new(&settings);
        backend.set_volume(shared.volume());

        Self {
            engine: Arc::new(Mutex::new(Engine {
                scheduler: LookaheadScheduler::from_config(&config),
                backend,
                fallback: None,
            })),
            shared,
            timer,
            tap: TapTempo::new(config.tap_window, config.tap_reset_ms),
            config,
            on_settings_changed: None,
        }
    }

    /// Register the receiver of settings-changed notifications
    pub fn on_settings_changed(&mut self, callback: SettingsCallback) {
        self.on_settings_changed = Some(callback);
    }

    /// Shared state (for display threads)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared)
    }

    pub fn state(&self) -> TransportState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.shared.snapshot()
    }

    pub fn settings(&self) -> MetronomeSettings {
        self.shared.settings()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start playback from the top of the bar. No-op while playing.
    pub fn start(&mut self) {
        if self.is_playing() {
            return;
        }

        {
            let mut engine = self.engine.lock();
            match engine.backend.resume() {
                Ok(()) => engine.fallback = None,
                Err(e) => {
                    // Keep the beat on a wall clock until a later start succeeds
                    log::warn!("Audio output unavailable, continuing silently: {}", e);
                    engine.fallback = Some(SilentBackend::new());
                }
            }
            let now = engine.clock_time();
            engine.scheduler.arm(now);
            self.shared.publish_position(0, 0);
            self.shared.set_playing(true);
            engine.poll(&self.shared);
        }

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(&self.shared);
        self.timer.start(
            self.config.poll_interval(),
            Box::new(move || {
                engine.lock().poll(&shared);
            }),
        );

        log::info!(
            "Metronome started at {} BPM ({}, {})",
            self.shared.bpm(),
            self.shared.time_signature(),
            self.shared.subdivision()
        );
    }

    /// Stop playback and rewind to the top of the bar. No-op while stopped.
    pub fn stop(&mut self) {
        if !self.is_playing() {
            return;
        }

        // Disarm under the poll lock first: a tick already waiting on the
        // lock will find the scheduler disarmed and do nothing
        self.engine.lock().scheduler.disarm();
        self.timer.cancel();

        self.shared.set_playing(false);
        self.shared.publish_position(0, 0);
        log::info!("Metronome stopped");
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Set tempo; rounded and clamped to [20, 300], NaN ignored
    pub fn set_bpm(&mut self, bpm: f64) {
        let Some(bpm) = clamp_bpm(bpm) else {
            log::debug!("Ignoring NaN tempo");
            return;
        };
        if bpm != self.shared.bpm() {
            self.shared.set_bpm(bpm);
            self.notify_settings_changed();
        }
    }

    pub fn increment_bpm(&mut self, delta: f64) {
        self.set_bpm(self.shared.bpm() as f64 + delta);
    }

    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        let time_signature = TimeSignature::new(time_signature.beats, time_signature.note_value);
        if time_signature != self.shared.time_signature() {
            {
                // Under the poll lock so no poll publishes in between
                let _engine = self.engine.lock();
                self.shared.set_time_signature(time_signature);
                self.shared.clamp_position();
            }
            self.notify_settings_changed();
        }
    }

    pub fn set_subdivision(&mut self, subdivision: SubdivisionKind) {
        if subdivision != self.shared.subdivision() {
            {
                let _engine = self.engine.lock();
                self.shared.set_subdivision(subdivision);
                self.shared.clamp_position();
            }
            self.notify_settings_changed();
        }
    }

    /// Set output volume; clamped to [0, 1], NaN ignored
    pub fn set_volume(&mut self, volume: f32) {
        let Some(volume) = clamp_volume(volume) else {
            log::debug!("Ignoring NaN volume");
            return;
        };
        if volume != self.shared.volume() {
            self.shared.set_volume(volume);
            self.engine.lock().backend.set_volume(volume);
            self.notify_settings_changed();
        }
    }

    pub fn set_mute_every(&mut self, mute_every: MuteEvery) {
        if mute_every != self.shared.mute_every() {
            self.shared.set_mute_every(mute_every);
            self.notify_settings_changed();
        }
    }

    /// Register a tap at `now_ms`; applies and returns the new tempo once
    /// there are enough taps
    pub fn tap_tempo(&mut self, now_ms: u64) -> Option<u32> {
        let bpm = self.tap.register_tap(now_ms)?;
        log::debug!("Tap tempo estimate: {} BPM", bpm);
        self.set_bpm(bpm as f64);
        Some(bpm)
    }

    /// Run `f` against the backend (under the poll lock)
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.engine.lock().backend)
    }

    fn notify_settings_changed(&mut self) {
        let settings = self.shared.settings();
        log::debug!("Settings changed: {:?}", settings);
        if let Some(callback) = self.on_settings_changed.as_mut() {
            callback(&settings);
        }
    }
}
