// Audio module - Output backends, clock and offline rendering

pub mod backend;
pub mod engine;
pub mod export;
pub mod format_conversion;
pub mod offline;
pub mod parameters;
pub mod timing;

pub use backend::{AudioBackend, BackendError, ScheduledClick, SilentBackend};
pub use engine::{CpalBackend, open_default_backend};
pub use offline::OfflineBackend;
