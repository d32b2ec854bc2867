// Integration test: Timing model, scheduler cycles and tap tempo behaviour

use pulse_metronome::audio::offline::OfflineBackend;
use pulse_metronome::audio::backend::AudioBackend;
use pulse_metronome::sequencer::scheduler::LookaheadScheduler;
use pulse_metronome::sequencer::settings::MetronomeSettings;
use pulse_metronome::sequencer::tap_tempo::TapTempo;
use pulse_metronome::sequencer::timeline::{
    ClickCategory, SubdivisionKind, TimeSignature, subdivision_interval,
};
use pulse_metronome::sequencer::transport::SharedTransportState;

#[test]
fn test_interval_formula_over_whole_range() {
    for bpm in 20..=300u32 {
        for kind in SubdivisionKind::ALL {
            let expected = (60.0 / bpm as f64) / kind.count() as f64;
            let actual = subdivision_interval(bpm, kind);
            assert!(
                (actual - expected).abs() < 1e-9,
                "bpm {} {:?}: {} vs {}",
                bpm,
                kind,
                actual,
                expected
            );
        }
    }
}

#[test]
fn test_seven_eight_with_triplets_cycle() {
    let shared = SharedTransportState::new(&MetronomeSettings {
        bpm: 210,
        time_signature: TimeSignature::new(7, 8),
        subdivision: SubdivisionKind::Triplet,
        ..MetronomeSettings::default()
    });
    let mut scheduler = LookaheadScheduler::default();
    let mut backend = OfflineBackend::new(44100.0);

    scheduler.arm(0.0);
    while backend.scheduled().len() < 2 * 7 * 3 {
        let now = backend.current_clock_time();
        scheduler.poll(now, &shared, &mut backend);
        backend.advance(1102);
    }

    let categories: Vec<ClickCategory> = backend
        .scheduled()
        .iter()
        .take(2 * 7 * 3)
        .map(|c| c.category)
        .collect();
    for (n, category) in categories.iter().enumerate() {
        let beat = (n / 3) % 7;
        let sub = n % 3;
        let expected = match (beat, sub) {
            (0, 0) => ClickCategory::Downbeat,
            (_, 0) => ClickCategory::Beat,
            _ => ClickCategory::Subdivision,
        };
        assert_eq!(*category, expected, "event {}", n);
    }
}

#[test]
fn test_subdivision_change_mid_beat() {
    let shared = SharedTransportState::new(&MetronomeSettings {
        subdivision: SubdivisionKind::Sixteenth,
        ..MetronomeSettings::default()
    });
    let mut scheduler = LookaheadScheduler::default();
    let mut backend = OfflineBackend::new(48000.0);

    scheduler.arm(0.0);
    // Schedule sixteenths 0 and 1 of beat 0, then drop to plain beats
    while backend.scheduled().len() < 3 {
        let now = backend.current_clock_time();
        scheduler.poll(now, &shared, &mut backend);
        backend.advance(1200);
    }
    assert_eq!(scheduler.position(), (0, 3));

    let mut settings = shared.settings();
    settings.subdivision = SubdivisionKind::None;
    let shared = SharedTransportState::new(&settings);

    let before = backend.scheduled().len();
    while backend.scheduled().len() < before + 2 {
        let now = backend.current_clock_time();
        scheduler.poll(now, &shared, &mut backend);
        backend.advance(1200);
    }

    // Sub index 3 is out of range for one click per beat: next click is beat 1
    let last_two: Vec<ClickCategory> = backend.scheduled()[before..before + 2]
        .iter()
        .map(|c| c.category)
        .collect();
    assert_eq!(last_two, vec![ClickCategory::Beat, ClickCategory::Beat]);
    let times: Vec<f64> = backend.scheduled()[before..before + 2]
        .iter()
        .map(|c| c.time)
        .collect();
    assert!((times[1] - times[0] - 0.5).abs() < 1e-9);
}

#[test]
fn test_tap_sequence_with_pause() {
    let mut tapper = TapTempo::default();
    for t in [0, 500, 1000] {
        tapper.register_tap(t);
    }
    assert_eq!(tapper.register_tap(1500), Some(120));

    // 2500ms pause clears the window
    assert_eq!(tapper.register_tap(4000), None);
    assert_eq!(tapper.register_tap(4600), Some(100));
    assert_eq!(tapper.register_tap(5200), Some(100));
}
