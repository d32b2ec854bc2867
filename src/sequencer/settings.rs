// Settings - The user-facing configuration of the metronome
// This is the payload handed to whoever persists settings

use super::timeline::{SubdivisionKind, TimeSignature};
use std::fmt;

/// Silence every Nth bar (bars counted from 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum MuteEvery {
    /// Play every bar
    #[default]
    Off,
    /// Mute bars 2, 4, 6...
    Second,
    /// Mute bars 3, 6, 9...
    Third,
    /// Mute bars 4, 8, 12...
    Fourth,
}

impl MuteEvery {
    pub const ALL: [MuteEvery; 4] = [
        MuteEvery::Off,
        MuteEvery::Second,
        MuteEvery::Third,
        MuteEvery::Fourth,
    ];

    /// Period in bars, 0 when disabled
    pub fn period(self) -> u8 {
        match self {
            MuteEvery::Off => 0,
            MuteEvery::Second => 2,
            MuteEvery::Third => 3,
            MuteEvery::Fourth => 4,
        }
    }

    /// Whether the bar with 0-based index `bar_index` is silent
    pub fn is_muted(self, bar_index: u64) -> bool {
        match self.period() {
            0 => false,
            period => (bar_index + 1) % period as u64 == 0,
        }
    }
}

/// Unknown periods map to Off
impl From<u8> for MuteEvery {
    fn from(value: u8) -> Self {
        match value {
            2 => MuteEvery::Second,
            3 => MuteEvery::Third,
            4 => MuteEvery::Fourth,
            _ => MuteEvery::Off,
        }
    }
}

impl From<MuteEvery> for u8 {
    fn from(value: MuteEvery) -> Self {
        value.period()
    }
}

impl fmt::Display for MuteEvery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuteEvery::Off => f.write_str("Disabled"),
            MuteEvery::Second => f.write_str("Every 2nd"),
            MuteEvery::Third => f.write_str("Every 3rd"),
            MuteEvery::Fourth => f.write_str("Every 4th"),
        }
    }
}

/// Full configuration snapshot sent on every settings change
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    pub bpm: u32,
    pub time_signature: TimeSignature,
    pub subdivision: SubdivisionKind,
    pub volume: f32,
    pub mute_every: MuteEvery,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            bpm: 120,
            time_signature: TimeSignature::four_four(),
            subdivision: SubdivisionKind::None,
            volume: 0.7,
            mute_every: MuteEvery::Off,
        }
    }
}

/// Called synchronously with the new settings after each change.
/// Debouncing and storage are up to the receiver.
pub type SettingsCallback = Box<dyn FnMut(&MetronomeSettings) + Send>;
