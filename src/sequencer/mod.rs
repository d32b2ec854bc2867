// Sequencer module
// Timing model, lookahead scheduling, tap tempo and transport control

pub mod scheduler;
pub mod settings;
pub mod tap_tempo;
pub mod timeline;
pub mod timer;
pub mod transport;

pub use scheduler::LookaheadScheduler;
pub use settings::{MetronomeSettings, MuteEvery, SettingsCallback};
pub use tap_tempo::TapTempo;
pub use timeline::{ClickCategory, SubdivisionKind, TimeSignature};
pub use timer::{ManualTimer, RepeatingTimer, ThreadTimer};
pub use transport::{SharedTransportState, Transport, TransportSnapshot, TransportState};
