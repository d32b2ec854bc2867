// Audio Export - Offline rendering to WAV files
//
// Runs the same scheduler and click pipeline as live playback, but against an
// `OfflineBackend` whose clock is advanced as fast as possible. Output is
// 16-bit mono PCM.

use crate::audio::backend::AudioBackend;
use crate::audio::format_conversion::f32_to_i16;
use crate::audio::offline::OfflineBackend;
use crate::config::EngineConfig;
use crate::sequencer::scheduler::LookaheadScheduler;
use crate::sequencer::settings::MetronomeSettings;
use crate::sequencer::timeline::ClickCategory;
use crate::sequencer::transport::SharedTransportState;
use crate::synth::click::render_click;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid duration: {0}s (must be > 0)")]
    InvalidDuration(f64),
}

/// Progress callback for export (reports 0.0 to 1.0)
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// WAV header used for every export: mono, 16-bit integer PCM
pub fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Renders metronome runs offline
pub struct MetronomeExporter {
    config: EngineConfig,
    progress: Option<ProgressCallback>,
}

impl MetronomeExporter {
    /// Invalid config fields fall back to their defaults
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: config.sanitized(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Render `duration_secs` of the metronome playing `settings` from a
    /// fresh start (first click after the configured start offset)
    pub fn render(
        &mut self,
        settings: &MetronomeSettings,
        duration_secs: f64,
    ) -> Result<Vec<f32>, ExportError> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(ExportError::InvalidDuration(duration_secs));
        }

        let sample_rate = self.config.sample_rate as f64;
        let total_samples = (duration_secs * sample_rate).round() as usize;
        // Poll at the live cadence so lookahead behaves as it does on a device
        let poll_frames =
            ((self.config.poll_interval_ms as f64 / 1000.0) * sample_rate).max(1.0) as usize;

        log::info!(
            "Rendering {:.2}s ({} samples) at {} Hz",
            duration_secs,
            total_samples,
            self.config.sample_rate
        );

        let shared = SharedTransportState::new(settings);
        let mut backend = OfflineBackend::new(self.config.sample_rate as f32);
        backend.set_volume(shared.volume());

        let mut scheduler = LookaheadScheduler::from_config(&self.config);
        scheduler.arm(backend.current_clock_time());

        let mut rendered = 0;
        let mut events = 0;
        while rendered < total_samples {
            events += scheduler.poll(backend.current_clock_time(), &shared, &mut backend);

            let frames = poll_frames.min(total_samples - rendered);
            backend.advance(frames);
            rendered += frames;

            if let Some(callback) = self.progress.as_mut() {
                callback(rendered as f32 / total_samples as f32);
            }
        }

        log::debug!("Rendered {} events", events);
        Ok(backend.take_rendered())
    }

    /// Render and write a WAV file. Returns the number of samples written.
    pub fn export_wav(
        &mut self,
        path: &Path,
        settings: &MetronomeSettings,
        duration_secs: f64,
    ) -> Result<usize, ExportError> {
        let samples = self.render(settings, duration_secs)?;
        let writer = WavWriter::create(path, wav_spec(self.config.sample_rate))?;
        write_samples(writer, &samples)?;

        log::info!("Exported {} samples to {}", samples.len(), path.display());
        Ok(samples.len())
    }
}

/// Write f32 samples as 16-bit PCM and finalize the file
pub fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    samples: &[f32],
) -> Result<(), ExportError> {
    for &sample in samples {
        writer.write_sample(f32_to_i16(sample))?;
    }
    writer.finalize()?;
    Ok(())
}

/// A single rendered click as an in-memory WAV file
pub fn click_wav_bytes(category: ClickCategory, sample_rate: u32) -> Result<Vec<u8>, ExportError> {
    let samples = render_click(category, sample_rate as f32);
    let mut cursor = Cursor::new(Vec::new());
    let writer = WavWriter::new(&mut cursor, wav_spec(sample_rate))?;
    write_samples(writer, &samples)?;
    Ok(cursor.into_inner())
}
