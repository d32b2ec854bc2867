// Timeline - Musical time representation
// Maps tempo, time signature and subdivision to click intervals and categories

use std::fmt;

/// Slowest tempo the metronome accepts
pub const MIN_BPM: u32 = 20;
/// Fastest tempo the metronome accepts
pub const MAX_BPM: u32 = 300;

/// Time signature (beats/note value)
/// Example: 6/8 time = TimeSignature { beats: 6, note_value: 8 }
///
/// Only `beats` drives scheduling; `note_value` is carried for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub beats: u32,      // Beats per bar
    pub note_value: u32, // Note value that gets one beat (4 = quarter, 8 = eighth)
}

impl TimeSignature {
    /// Signatures offered by the selector
    pub const PRESETS: [TimeSignature; 6] = [
        TimeSignature::const_new(2, 4),
        TimeSignature::const_new(3, 4),
        TimeSignature::const_new(4, 4),
        TimeSignature::const_new(5, 4),
        TimeSignature::const_new(6, 8),
        TimeSignature::const_new(7, 8),
    ];

    const fn const_new(beats: u32, note_value: u32) -> Self {
        Self { beats, note_value }
    }

    /// Creates a new time signature
    /// Zero values are raised to 1 rather than rejected
    pub fn new(beats: u32, note_value: u32) -> Self {
        Self {
            beats: beats.max(1),
            note_value: note_value.max(1),
        }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    /// Common 6/8 time signature
    pub fn six_eight() -> Self {
        Self::new(6, 8)
    }

    /// Pack into a single word so it can live in one atomic
    pub(crate) fn to_bits(self) -> u64 {
        ((self.beats as u64) << 32) | self.note_value as u64
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        Self::new((bits >> 32) as u32, bits as u32)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.note_value)
    }
}

/// How each beat is split into clicks
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubdivisionKind {
    /// One click per beat
    #[default]
    None,
    /// Two clicks per beat
    Eighth,
    /// Three clicks per beat
    Triplet,
    /// Four clicks per beat
    Sixteenth,
}

impl SubdivisionKind {
    pub const ALL: [SubdivisionKind; 4] = [
        SubdivisionKind::None,
        SubdivisionKind::Eighth,
        SubdivisionKind::Triplet,
        SubdivisionKind::Sixteenth,
    ];

    /// Number of clicks per beat (always >= 1)
    pub fn count(self) -> u32 {
        match self {
            SubdivisionKind::None => 1,
            SubdivisionKind::Eighth => 2,
            SubdivisionKind::Triplet => 3,
            SubdivisionKind::Sixteenth => 4,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            SubdivisionKind::None => 0,
            SubdivisionKind::Eighth => 1,
            SubdivisionKind::Triplet => 2,
            SubdivisionKind::Sixteenth => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => SubdivisionKind::Eighth,
            2 => SubdivisionKind::Triplet,
            3 => SubdivisionKind::Sixteenth,
            _ => SubdivisionKind::None,
        }
    }
}

impl fmt::Display for SubdivisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubdivisionKind::None => "none",
            SubdivisionKind::Eighth => "eighth",
            SubdivisionKind::Triplet => "triplet",
            SubdivisionKind::Sixteenth => "sixteenth",
        };
        f.write_str(label)
    }
}

/// Click category, picks the sound for a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickCategory {
    /// First subdivision of the first beat in the bar (accent)
    Downbeat,
    /// First subdivision of any other beat
    Beat,
    /// Any non-zero subdivision
    Subdivision,
}

impl ClickCategory {
    pub const ALL: [ClickCategory; 3] = [
        ClickCategory::Downbeat,
        ClickCategory::Beat,
        ClickCategory::Subdivision,
    ];
}

/// Number of clicks per beat for a subdivision kind
#[inline]
pub fn subdivision_count(kind: SubdivisionKind) -> u32 {
    kind.count()
}

/// Seconds between two consecutive clicks
#[inline]
pub fn subdivision_interval(bpm: u32, kind: SubdivisionKind) -> f64 {
    (60.0 / bpm as f64) / subdivision_count(kind) as f64
}

/// Category of the click at the given position in the bar
#[inline]
pub fn classify(beat_index: u32, subdivision_index: u32) -> ClickCategory {
    if subdivision_index != 0 {
        ClickCategory::Subdivision
    } else if beat_index == 0 {
        ClickCategory::Downbeat
    } else {
        ClickCategory::Beat
    }
}

/// Round and clamp an arbitrary tempo into [MIN_BPM, MAX_BPM]
/// Returns None for NaN
pub fn clamp_bpm(bpm: f64) -> Option<u32> {
    if bpm.is_nan() {
        return None;
    }
    Some(bpm.round().clamp(MIN_BPM as f64, MAX_BPM as f64) as u32)
}
