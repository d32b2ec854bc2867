// Tap tempo - Estimate BPM from the spacing of user taps

use super::timeline::{MAX_BPM, MIN_BPM};
use std::collections::VecDeque;

/// Tap-based tempo estimator.
///
/// Keeps a sliding window of the most recent taps and averages the gaps
/// between them. A pause longer than the reset gap starts a new measurement.
///
/// ```
/// use pulse_metronome::sequencer::tap_tempo::TapTempo;
///
/// let mut tapper = TapTempo::new(4, 2000);
/// tapper.register_tap(0);
/// assert_eq!(tapper.register_tap(500), Some(120));
/// ```
#[derive(Debug, Clone)]
pub struct TapTempo {
    window: usize,
    reset_gap_ms: u64,
    taps: VecDeque<u64>,
}

impl TapTempo {
    pub const DEFAULT_WINDOW: usize = 4;
    pub const DEFAULT_RESET_GAP_MS: u64 = 2000;

    /// Create a new tap-tempo helper.
    ///
    /// * `window` – number of most recent taps averaged (at least 2).
    /// * `reset_gap_ms` – a gap longer than this clears the tap history.
    pub fn new(window: usize, reset_gap_ms: u64) -> Self {
        let window = window.max(2);
        Self {
            window,
            reset_gap_ms,
            taps: VecDeque::with_capacity(window + 1),
        }
    }

    /// Register a tap at `now_ms` (milliseconds, any monotonic origin).
    ///
    /// Returns the estimated BPM, clamped to the metronome range, once at
    /// least two taps are in the window; `None` otherwise.
    pub fn register_tap(&mut self, now_ms: u64) -> Option<u32> {
        if let Some(&last) = self.taps.back() {
            // Time going backwards is treated like a long pause
            if now_ms < last || now_ms - last > self.reset_gap_ms {
                self.taps.clear();
            }
        }

        self.taps.push_back(now_ms);
        if self.taps.len() > self.window {
            self.taps.pop_front();
        }

        self.estimate()
    }

    /// Current estimate without registering a tap
    pub fn estimate(&self) -> Option<u32> {
        let (first, last) = (*self.taps.front()?, *self.taps.back()?);
        let intervals = self.taps.len().checked_sub(1).filter(|&n| n > 0)?;

        // Mean of consecutive intervals telescopes to (last - first) / n
        let mean_interval = (last - first) as f64 / intervals as f64;
        if mean_interval <= 0.0 {
            return None;
        }

        let bpm = (60_000.0 / mean_interval).round();
        Some(bpm.clamp(MIN_BPM as f64, MAX_BPM as f64) as u32)
    }

    /// Taps currently in the window
    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW, Self::DEFAULT_RESET_GAP_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::TapTempo;

    #[test]
    fn computes_expected_bpm() {
        let mut tapper = TapTempo::default();

        assert_eq!(tapper.register_tap(0), None);
        assert_eq!(tapper.register_tap(500), Some(120));
        assert_eq!(tapper.register_tap(1000), Some(120));
        assert_eq!(tapper.register_tap(1500), Some(120));
    }

    #[test]
    fn averages_uneven_taps() {
        let mut tapper = TapTempo::default();
        tapper.register_tap(10_000);
        tapper.register_tap(10_400);
        // Mean of 400 and 600 = 500ms
        assert_eq!(tapper.register_tap(11_000), Some(120));
    }

    #[test]
    fn keeps_only_latest_taps() {
        let mut tapper = TapTempo::default();
        // Slow taps first, then fast ones push them out of the window
        for t in [0, 1000, 2000] {
            tapper.register_tap(t);
        }
        for t in [2250, 2500, 2750] {
            tapper.register_tap(t);
        }
        assert_eq!(tapper.tap_count(), 4);
        assert_eq!(tapper.estimate(), Some(240));
    }

    #[test]
    fn resets_after_gap() {
        let mut tapper = TapTempo::default();

        assert_eq!(tapper.register_tap(0), None);
        assert_eq!(tapper.register_tap(500), Some(120));
        // big gap -> reset
        assert_eq!(tapper.register_tap(3000), None);
        assert_eq!(tapper.tap_count(), 1);
        assert_eq!(tapper.register_tap(3600), Some(100));
    }

    #[test]
    fn gap_of_exactly_reset_time_keeps_window() {
        let mut tapper = TapTempo::default();
        tapper.register_tap(0);
        assert_eq!(tapper.register_tap(2000), Some(30));
    }

    #[test]
    fn clamps_to_range() {
        let mut tapper = TapTempo::default();
        tapper.register_tap(0);
        // 50ms apart = 1200 BPM
        assert_eq!(tapper.register_tap(50), Some(300));

        let mut slow = TapTempo::new(4, 10_000);
        slow.register_tap(0);
        // 5s apart = 12 BPM
        assert_eq!(slow.register_tap(5000), Some(20));
    }

    #[test]
    fn duplicate_and_backwards_timestamps() {
        let mut tapper = TapTempo::default();
        tapper.register_tap(1000);
        assert_eq!(tapper.register_tap(1000), None);

        let mut tapper = TapTempo::default();
        tapper.register_tap(5000);
        assert_eq!(tapper.register_tap(4000), None);
        assert_eq!(tapper.tap_count(), 1);
    }
}
