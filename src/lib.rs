// Pulse Metronome - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::{AudioBackend, CpalBackend, OfflineBackend, SilentBackend, open_default_backend};
pub use config::{ConfigError, EngineConfig};
pub use sequencer::{
    ClickCategory, LookaheadScheduler, ManualTimer, MetronomeSettings, MuteEvery,
    SubdivisionKind, TapTempo, ThreadTimer, TimeSignature, Transport, TransportSnapshot,
    TransportState,
};
