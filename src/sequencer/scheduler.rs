// Lookahead scheduler - Turns a jittery periodic poll into exact click times
//
// Each poll looks `lookahead` seconds past the backend clock and hands every
// click due in that window to the backend, stamped with its exact time. The
// next click time is accumulated from the interval in effect when the
// counters advance, so tempo changes never re-time clicks already queued and
// a constant tempo never drifts, however late the polls arrive.
//
// Single writer: the scheduler is only touched by whoever holds the engine
// lock (see transport.rs). Counters are published to SharedTransportState
// for display.

use super::timeline::{classify, subdivision_interval};
use super::transport::SharedTransportState;
use crate::audio::backend::{AudioBackend, ScheduledClick};
use crate::config::EngineConfig;

/// If the next click is this far behind the clock (stalled host, suspended
/// device), skip ahead instead of flushing a burst of stale clicks
const MAX_LATENESS_SECS: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    lookahead: f64,
    start_offset: f64,

    // Live position, advanced on every scheduled event
    next_event_time: f64,
    beat_index: u32,
    subdivision_index: u32,
    bar_index: u64,

    armed: bool,
}

impl LookaheadScheduler {
    /// Window scheduled ahead of the clock on each poll
    pub const DEFAULT_LOOKAHEAD_SECS: f64 = 0.1;
    /// Delay of the first click after arming, so it is never in the past
    pub const DEFAULT_START_OFFSET_SECS: f64 = 0.05;

    /// Non-finite values fall back to the defaults, negatives to zero
    pub fn new(lookahead: f64, start_offset: f64) -> Self {
        let lookahead = if lookahead.is_finite() {
            lookahead.max(0.0)
        } else {
            Self::DEFAULT_LOOKAHEAD_SECS
        };
        let start_offset = if start_offset.is_finite() {
            start_offset.max(0.0)
        } else {
            Self::DEFAULT_START_OFFSET_SECS
        };
        Self {
            lookahead,
            start_offset,
            next_event_time: 0.0,
            beat_index: 0,
            subdivision_index: 0,
            bar_index: 0,
            armed: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.lookahead_secs, config.start_offset_secs)
    }

    /// Start a fresh run at the top of the bar
    pub fn arm(&mut self, start_clock_time: f64) {
        self.next_event_time = start_clock_time + self.start_offset;
        self.reset_position();
        self.armed = true;
    }

    /// Stop producing events. Clicks already handed to the backend still play.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.reset_position();
    }

    fn reset_position(&mut self) {
        self.beat_index = 0;
        self.subdivision_index = 0;
        self.bar_index = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Time of the next click to be scheduled (backend clock seconds)
    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// (beat, subdivision) of the next click to be scheduled
    pub fn position(&self) -> (u32, u32) {
        (self.beat_index, self.subdivision_index)
    }

    /// 0-based bar counter since arming
    pub fn bar_index(&self) -> u64 {
        self.bar_index
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    /// Schedule every click due before `now + lookahead`
    ///
    /// Returns how many events were produced (muted bars included). A no-op
    /// when the scheduler is not armed.
    pub fn poll<B>(&mut self, now: f64, shared: &SharedTransportState, backend: &mut B) -> usize
    where
        B: AudioBackend + ?Sized,
    {
        if !self.armed {
            return 0;
        }

        if self.next_event_time < now - MAX_LATENESS_SECS {
            log::warn!(
                "Scheduler fell {:.3}s behind the audio clock, resyncing",
                now - self.next_event_time
            );
            self.next_event_time = now + self.start_offset;
        }

        let mut produced = 0;
        while self.next_event_time < now + self.lookahead {
            self.normalize_position(shared);

            let category = classify(self.beat_index, self.subdivision_index);
            if shared.mute_every().is_muted(self.bar_index) {
                log::trace!("bar {} muted, skipping {:?}", self.bar_index + 1, category);
            } else {
                let click = ScheduledClick::new(category, self.next_event_time);
                if let Err(e) = backend.schedule_click(click) {
                    // Drop this click, keep the loop going
                    log::warn!("Failed to schedule {:?} click: {}", category, e);
                }
            }

            shared.publish_position(self.beat_index, self.subdivision_index);

            self.advance_position(shared);
            self.next_event_time += subdivision_interval(shared.bpm(), shared.subdivision());
            produced += 1;
        }

        produced
    }

    /// A signature or subdivision change may leave the counters past the end
    /// of the bar/beat; wrap them the same way an advance would
    fn normalize_position(&mut self, shared: &SharedTransportState) {
        let beats = shared.time_signature().beats;
        let count = shared.subdivision().count();

        if self.subdivision_index >= count {
            self.subdivision_index = 0;
            self.beat_index += 1;
        }
        if self.beat_index >= beats {
            self.beat_index = 0;
            self.bar_index += 1;
        }
    }

    fn advance_position(&mut self, shared: &SharedTransportState) {
        let beats = shared.time_signature().beats;
        let count = shared.subdivision().count();

        self.subdivision_index += 1;
        if self.subdivision_index >= count {
            self.subdivision_index = 0;
            self.beat_index += 1;
            if self.beat_index >= beats {
                self.beat_index = 0;
                self.bar_index += 1;
            }
        }
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_LOOKAHEAD_SECS,
            Self::DEFAULT_START_OFFSET_SECS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::BackendError;
    use crate::audio::offline::OfflineBackend;
    use crate::sequencer::settings::{MetronomeSettings, MuteEvery};
    use crate::sequencer::timeline::{ClickCategory, SubdivisionKind, TimeSignature};
    use std::sync::Arc;

    /// Records click times without rendering audio
    #[derive(Default)]
    struct RecordingBackend {
        clicks: Vec<ScheduledClick>,
        fail: bool,
        attempts: usize,
    }

    impl AudioBackend for RecordingBackend {
        fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError> {
            self.attempts += 1;
            if self.fail {
                return Err(BackendError::Disconnected);
            }
            self.clicks.push(click);
            Ok(())
        }

        fn current_clock_time(&self) -> f64 {
            0.0
        }

        fn resume(&mut self) -> Result<(), BackendError> {
            Ok(())
        }

        fn set_volume(&mut self, _volume: f32) {}
    }

    fn shared_with(settings: MetronomeSettings) -> Arc<SharedTransportState> {
        SharedTransportState::new(&settings)
    }

    #[test]
    fn test_poll_without_arm_is_noop() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        assert_eq!(scheduler.poll(10.0, &shared, &mut backend), 0);
        assert!(backend.clicks.is_empty());
    }

    #[test]
    fn test_non_finite_timing_falls_back_to_defaults() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::new(f64::INFINITY, f64::NAN);
        assert_eq!(scheduler.lookahead(), LookaheadScheduler::DEFAULT_LOOKAHEAD_SECS);

        let mut backend = RecordingBackend::default();
        scheduler.arm(0.0);
        assert_eq!(scheduler.poll(0.0, &shared, &mut backend), 1);
        assert!((backend.clicks[0].time - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_first_click_after_start_offset() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(2.0);
        assert_eq!(scheduler.poll(2.0, &shared, &mut backend), 1);

        assert_eq!(backend.clicks.len(), 1);
        assert_eq!(backend.clicks[0].category, ClickCategory::Downbeat);
        assert!((backend.clicks[0].time - 2.05).abs() < 1e-12);
        // 120 BPM: next beat half a second later
        assert!((scheduler.next_event_time() - 2.55).abs() < 1e-12);
    }

    #[test]
    fn test_three_four_eighths_cycle() {
        let shared = shared_with(MetronomeSettings {
            time_signature: TimeSignature::three_four(),
            subdivision: SubdivisionKind::Eighth,
            ..MetronomeSettings::default()
        });
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        let mut positions = Vec::new();
        let mut now = 0.0;
        while positions.len() < 7 {
            let before = scheduler.position();
            if scheduler.poll(now, &shared, &mut backend) > 0 {
                positions.push(before);
            }
            now += 0.25;
        }

        assert_eq!(
            positions,
            vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1), (0, 0)]
        );

        let categories: Vec<ClickCategory> =
            backend.clicks.iter().take(6).map(|c| c.category).collect();
        assert_eq!(
            categories,
            vec![
                ClickCategory::Downbeat,
                ClickCategory::Subdivision,
                ClickCategory::Beat,
                ClickCategory::Subdivision,
                ClickCategory::Beat,
                ClickCategory::Subdivision,
            ]
        );
    }

    #[test]
    fn test_published_position_follows_events() {
        let shared = shared_with(MetronomeSettings {
            subdivision: SubdivisionKind::Triplet,
            ..MetronomeSettings::default()
        });
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        scheduler.poll(0.0, &shared, &mut backend);
        assert_eq!(shared.position(), (0, 0));

        // Triplets at 120 BPM are 1/6 s apart; the second one is at ~0.2167
        scheduler.poll(0.15, &shared, &mut backend);
        assert_eq!(shared.position(), (0, 1));
    }

    #[test]
    fn test_no_drift_over_ten_thousand_events() {
        let shared = shared_with(MetronomeSettings {
            bpm: 173,
            subdivision: SubdivisionKind::Triplet,
            ..MetronomeSettings::default()
        });
        let interval = subdivision_interval(173, SubdivisionKind::Triplet);
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        let mut now = 0.0;
        // Irregular poll spacing, as a real timer would deliver
        let jitter = [0.021, 0.025, 0.031, 0.018, 0.027];
        let mut i = 0;
        while backend.clicks.len() < 10_000 {
            scheduler.poll(now, &shared, &mut backend);
            now += jitter[i % jitter.len()];
            i += 1;
        }

        for (n, click) in backend.clicks.iter().enumerate().take(10_000) {
            let expected = 0.05 + n as f64 * interval;
            assert!(
                (click.time - expected).abs() < 0.001,
                "event {} drifted: {} vs {}",
                n,
                click.time,
                expected
            );
        }
        for pair in backend.clicks.windows(2) {
            assert!((pair[1].time - pair[0].time - interval).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bpm_change_applies_to_next_interval_only() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        scheduler.poll(0.0, &shared, &mut backend); // 0.05, next at 0.55
        shared.set_bpm(60);
        scheduler.poll(0.5, &shared, &mut backend); // 0.55 keeps its time, next at 1.55
        scheduler.poll(1.5, &shared, &mut backend);

        let times: Vec<f64> = backend.clicks.iter().map(|c| c.time).collect();
        assert_eq!(times.len(), 3);
        assert!((times[0] - 0.05).abs() < 1e-12);
        assert!((times[1] - 0.55).abs() < 1e-12);
        assert!((times[2] - 1.55).abs() < 1e-12);
    }

    #[test]
    fn test_disarm_stops_and_resets() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        scheduler.poll(0.0, &shared, &mut backend);
        scheduler.poll(0.5, &shared, &mut backend);
        assert_eq!(scheduler.position(), (2, 0));

        scheduler.disarm();
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.position(), (0, 0));
        assert_eq!(scheduler.poll(5.0, &shared, &mut backend), 0);
        assert_eq!(backend.clicks.len(), 2);
    }

    #[test]
    fn test_backend_errors_do_not_stop_scheduling() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend {
            fail: true,
            ..RecordingBackend::default()
        };

        scheduler.arm(0.0);
        scheduler.poll(0.0, &shared, &mut backend);
        scheduler.poll(0.5, &shared, &mut backend);
        scheduler.poll(1.0, &shared, &mut backend);

        assert_eq!(backend.attempts, 3);
        assert_eq!(scheduler.position(), (3, 0));
    }

    #[test]
    fn test_mute_every_second_bar() {
        let shared = shared_with(MetronomeSettings {
            time_signature: TimeSignature::new(2, 4),
            mute_every: MuteEvery::Second,
            ..MetronomeSettings::default()
        });
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        // 12 beats = 6 bars of 2/4 at 120 BPM
        let mut now = 0.0;
        let mut produced = 0;
        while produced < 12 {
            produced += scheduler.poll(now, &shared, &mut backend);
            now += 0.025;
        }

        // Bars 1, 3, 5 sound, 2 beats each
        assert_eq!(backend.clicks.len(), 6);
        let bars: Vec<u64> = backend
            .clicks
            .iter()
            .map(|c| (c.time - 0.05 + 1e-6).floor() as u64)
            .collect();
        assert_eq!(bars, vec![0, 0, 2, 2, 4, 4]);
        assert_eq!(scheduler.bar_index(), 6);
    }

    #[test]
    fn test_signature_shrink_wraps_position() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        // Schedule beats 0, 1, 2, 3 of 4/4
        let mut now = 0.0;
        while backend.clicks.len() < 4 {
            scheduler.poll(now, &shared, &mut backend);
            now += 0.025;
        }
        assert_eq!(scheduler.position(), (0, 0));

        // Move to beat 3 then switch to 2/4: the next click starts a new bar
        while backend.clicks.len() < 7 {
            scheduler.poll(now, &shared, &mut backend);
            now += 0.025;
        }
        assert_eq!(scheduler.position(), (3, 0));
        shared.set_time_signature(TimeSignature::new(2, 4));
        while backend.clicks.len() < 8 {
            scheduler.poll(now, &shared, &mut backend);
            now += 0.025;
        }
        assert_eq!(backend.clicks[7].category, ClickCategory::Downbeat);
        assert_eq!(scheduler.position(), (1, 0));
    }

    #[test]
    fn test_resync_after_stall() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = RecordingBackend::default();

        scheduler.arm(0.0);
        scheduler.poll(0.0, &shared, &mut backend);
        // Host stalled for a minute
        let produced = scheduler.poll(60.0, &shared, &mut backend);
        assert_eq!(produced, 1);
        assert!((backend.clicks[1].time - 60.05).abs() < 1e-9);
    }

    #[test]
    fn test_offline_backend_renders_scheduled_clicks() {
        let shared = shared_with(MetronomeSettings::default());
        let mut scheduler = LookaheadScheduler::default();
        let mut backend = OfflineBackend::new(48000.0);

        scheduler.arm(backend.current_clock_time());
        for _ in 0..40 {
            let now = backend.current_clock_time();
            scheduler.poll(now, &shared, &mut backend);
            backend.advance(1200); // 25ms
        }

        // One second at 120 BPM: clicks at 0.05 and 0.55
        let rendered = backend.rendered();
        assert_eq!(rendered.len(), 48000);
        let onset = |from: usize| {
            rendered[from..]
                .iter()
                .position(|s| s.abs() > 1e-6)
                .map(|p| p + from)
        };
        assert_eq!(onset(0), Some(2400));
        assert_eq!(onset(2400 + 2400), Some(26400));
    }
}
