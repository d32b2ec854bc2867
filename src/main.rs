use clap::{Parser, ValueEnum};
use pulse_metronome::audio::export::MetronomeExporter;
use pulse_metronome::sequencer::{
    MetronomeSettings, MuteEvery, SubdivisionKind, ThreadTimer, TimeSignature, Transport,
    TransportSnapshot,
};
use pulse_metronome::{EngineConfig, open_default_backend};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

/// Step applied by the `+` / `-` commands
const BPM_STEP: f64 = 5.0;

/// Length of an export when `--duration` is not given
const DEFAULT_EXPORT_SECS: f64 = 10.0;

#[derive(Parser)]
#[command(name = "pulse-metronome")]
#[command(author, version, about = "Sample-accurate metronome", long_about = None)]
struct Cli {
    /// Tempo in beats per minute (20-300)
    #[arg(short, long, default_value_t = 120.0)]
    bpm: f64,

    /// Beats per bar
    #[arg(long, default_value_t = 4)]
    beats: u32,

    /// Note value of one beat
    #[arg(long, default_value_t = 4)]
    note_value: u32,

    /// Clicks per beat
    #[arg(short, long, value_enum, default_value_t = SubdivisionArg::None)]
    subdivision: SubdivisionArg,

    /// Output volume (0.0-1.0)
    #[arg(short, long, default_value_t = 0.7)]
    volume: f32,

    /// Silence every Nth bar (0 = off, 2, 3 or 4)
    #[arg(long, default_value_t = 0, value_parser = parse_mute_every)]
    mute_every: u8,

    /// Engine configuration file (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Play (or export) for this many seconds, then exit
    #[arg(short, long)]
    duration: Option<f64>,

    /// Render to a 16-bit WAV file instead of playing
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SubdivisionArg {
    None,
    Eighth,
    Triplet,
    Sixteenth,
}

impl From<SubdivisionArg> for SubdivisionKind {
    fn from(arg: SubdivisionArg) -> Self {
        match arg {
            SubdivisionArg::None => SubdivisionKind::None,
            SubdivisionArg::Eighth => SubdivisionKind::Eighth,
            SubdivisionArg::Triplet => SubdivisionKind::Triplet,
            SubdivisionArg::Sixteenth => SubdivisionKind::Sixteenth,
        }
    }
}

fn parse_mute_every(value: &str) -> Result<u8, String> {
    match value.parse::<u8>() {
        Ok(n @ (0 | 2 | 3 | 4)) => Ok(n),
        _ => Err(format!("expected 0, 2, 3 or 4, got '{}'", value)),
    }
}

impl Cli {
    fn settings(&self) -> MetronomeSettings {
        MetronomeSettings {
            // Clamped into range by the transport
            bpm: self.bpm.round().clamp(0.0, u32::MAX as f64) as u32,
            time_signature: TimeSignature::new(self.beats, self.note_value),
            subdivision: self.subdivision.into(),
            volume: self.volume,
            mute_every: MuteEvery::from(self.mute_every),
        }
    }

    fn engine_config(&self) -> Result<EngineConfig, pulse_metronome::ConfigError> {
        match &self.config {
            Some(path) => EngineConfig::load(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.engine_config()?;
    let settings = cli.settings();

    if let Some(path) = &cli.export {
        let duration = cli.duration.unwrap_or(DEFAULT_EXPORT_SECS);
        let written = MetronomeExporter::new(config).export_wav(path, &settings, duration)?;
        println!("Wrote {} samples to {}", written, path.display());
        return Ok(());
    }

    let backend = open_default_backend(&config);
    let mut transport = Transport::new(backend, ThreadTimer::new(), config, settings);
    transport.on_settings_changed(Box::new(|settings: &MetronomeSettings| {
        log::info!(
            "{} BPM, {}, {}, volume {:.2}, mute {}",
            settings.bpm,
            settings.time_signature,
            settings.subdivision,
            settings.volume,
            settings.mute_every
        );
    }));

    if let Some(seconds) = cli.duration {
        transport.start();
        std::thread::sleep(Duration::from_secs_f64(seconds.max(0.0)));
        transport.stop();
        return Ok(());
    }

    run_interactive(&mut transport)
}

fn run_interactive<B>(
    transport: &mut Transport<B, ThreadTimer>,
) -> Result<(), Box<dyn std::error::Error>>
where
    B: pulse_metronome::AudioBackend + Send + 'static,
{
    println!("=== Pulse Metronome ===");
    println!("Commands: t = tap, + / - = tempo, space or p = play/stop, q = quit\n");
    print_status(&transport.snapshot());

    let origin = Instant::now();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = line.trim_end_matches(['\r', '\n']);

        match command.trim() {
            "t" => {
                let now_ms = origin.elapsed().as_millis() as u64;
                if transport.tap_tempo(now_ms).is_none() {
                    println!("tap...");
                }
            }
            "+" => transport.increment_bpm(BPM_STEP),
            "-" => transport.increment_bpm(-BPM_STEP),
            "p" => transport.toggle(),
            "" if command.contains(' ') => transport.toggle(),
            "q" => break,
            "" => {}
            other => println!("Unknown command: {}", other),
        }

        print_status(&transport.snapshot());
    }

    transport.stop();
    Ok(())
}

fn print_status(snapshot: &TransportSnapshot) {
    println!(
        "[{}] {} BPM {} {} | beat {}/{} sub {}/{}",
        if snapshot.is_playing { "playing" } else { "stopped" },
        snapshot.bpm,
        snapshot.time_signature,
        snapshot.subdivision,
        snapshot.current_beat + 1,
        snapshot.time_signature.beats,
        snapshot.current_subdivision + 1,
        snapshot.subdivision_count
    );
}
