// Engine configuration - Timing and audio knobs, loadable from a RON file
//
// Example `metronome.ron`:
//
//     (
//         lookahead_secs: 0.1,
//         poll_interval_ms: 25,
//         sample_rate: 48000,
//     )
//
// Missing fields keep their defaults.

use std::path::Path;
use std::time::Duration;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far past the clock each poll schedules clicks
    pub lookahead_secs: f64,
    /// Period of the scheduler poll
    pub poll_interval_ms: u64,
    /// Delay of the first click after start
    pub start_offset_secs: f64,
    /// Sample rate for offline rendering and export
    pub sample_rate: u32,
    /// Taps averaged by tap tempo
    pub tap_window: usize,
    /// Gap after which tap tempo starts over
    pub tap_reset_ms: u64,
    /// Capacity of the click queue towards the audio thread
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.1,
            poll_interval_ms: 25,
            start_offset_secs: 0.05,
            sample_rate: 44100,
            tap_window: 4,
            tap_reset_ms: 2000,
            queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Parse and validate RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lookahead_secs.is_finite() && self.lookahead_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "lookahead_secs must be > 0, got {}",
                self.lookahead_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.poll_interval_ms as f64 / 1000.0 >= self.lookahead_secs {
            // Clicks would fall between polls
            return Err(ConfigError::Invalid(format!(
                "poll interval ({}ms) must be shorter than the lookahead ({}s)",
                self.poll_interval_ms, self.lookahead_secs
            )));
        }
        if !(self.start_offset_secs.is_finite() && self.start_offset_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "start_offset_secs must be >= 0, got {}",
                self.start_offset_secs
            )));
        }
        if self.sample_rate < 8000 {
            return Err(ConfigError::Invalid(format!(
                "sample_rate too low: {}",
                self.sample_rate
            )));
        }
        if self.tap_window < 2 {
            return Err(ConfigError::Invalid(
                "tap_window needs at least two taps".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be > 0".into()));
        }
        Ok(())
    }

    /// Replace every invalid field with its default, for configs built in
    /// code rather than loaded through `from_ron`
    pub fn sanitized(self) -> Self {
        let Err(e) = self.validate() else {
            return self;
        };
        log::warn!("{}, falling back to defaults for invalid fields", e);

        let defaults = Self::default();
        let mut config = self;
        if !(config.lookahead_secs.is_finite() && config.lookahead_secs > 0.0) {
            config.lookahead_secs = defaults.lookahead_secs;
        }
        if config.poll_interval_ms == 0
            || config.poll_interval_ms as f64 / 1000.0 >= config.lookahead_secs
        {
            let quarter_lookahead_ms = (config.lookahead_secs * 1000.0 / 4.0) as u64;
            config.poll_interval_ms = defaults.poll_interval_ms.min(quarter_lookahead_ms).max(1);
        }
        if !(config.start_offset_secs.is_finite() && config.start_offset_secs >= 0.0) {
            config.start_offset_secs = defaults.start_offset_secs;
        }
        if config.sample_rate < 8000 {
            config.sample_rate = defaults.sample_rate;
        }
        if config.tap_window < 2 {
            config.tap_window = defaults.tap_window;
        }
        if config.queue_capacity == 0 {
            config.queue_capacity = defaults.queue_capacity;
        }

        match config.validate() {
            Ok(()) => config,
            Err(_) => defaults,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(25));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = EngineConfig::from_ron("(sample_rate: 48000, tap_window: 6)").unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.tap_window, 6);
        assert_eq!(config.lookahead_secs, 0.1);
        assert_eq!(config.tap_reset_ms, 2000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_ron("(poll_interval_ms: 200)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_ron("(tap_window: 1)"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_ron("(lookahead_secs: 0.0)"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_sanitized_replaces_invalid_fields() {
        let config = EngineConfig {
            lookahead_secs: f64::INFINITY,
            start_offset_secs: f64::NAN,
            sample_rate: 0,
            tap_window: 0,
            queue_capacity: 0,
            tap_reset_ms: 1500,
            ..EngineConfig::default()
        }
        .sanitized();

        assert!(config.validate().is_ok());
        assert_eq!(config.lookahead_secs, 0.1);
        assert_eq!(config.start_offset_secs, 0.05);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.tap_window, 4);
        assert_eq!(config.queue_capacity, 256);
        // Valid fields are kept
        assert_eq!(config.tap_reset_ms, 1500);
    }

    #[test]
    fn test_sanitized_shortens_poll_for_small_lookahead() {
        let config = EngineConfig {
            lookahead_secs: 0.02,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.lookahead_secs, 0.02);
        assert_eq!(config.poll_interval_ms, 5);
        assert!(config.validate().is_ok());

        let tiny = EngineConfig {
            lookahead_secs: 0.0005,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(tiny, EngineConfig::default());
    }

    #[test]
    fn test_sanitized_keeps_valid_config() {
        let config = EngineConfig {
            lookahead_secs: 0.2,
            poll_interval_ms: 50,
            sample_rate: 48000,
            ..EngineConfig::default()
        };
        assert_eq!(config.clone().sanitized(), config);
    }

    #[test]
    fn test_malformed_ron() {
        assert!(matches!(
            EngineConfig::from_ron("(sample_rate: \"fast\")"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(lookahead_secs: 0.2, poll_interval_ms: 50)").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.lookahead_secs, 0.2);
        assert_eq!(config.poll_interval_ms, 50);

        let missing = EngineConfig::load(Path::new("/nonexistent/metronome.ron"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
