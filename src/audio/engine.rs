// Realtime audio engine - CPAL output stream playing scheduled clicks
//
// # Format Support
//
// The stream is built for the device's preferred sample format:
// - **F32**: native, no conversion
// - **I16**: common on Windows/WASAPI
// - **U16**: rare
//
// Clicks are mixed in f32 and converted while writing the interleaved output
// buffer (see format_conversion.rs).
//
// # Threading
//
// On macOS (CoreAudio) the `Stream` is not Send, so it is built and owned by a
// dedicated "metronome-audio" thread for its whole life. `CpalBackend` only
// holds Send handles: the click queue producer, the shared clock, the volume
// and a command channel to that thread.
//
// Control thread -> audio callback: `ScheduledClick`s through a lock-free SPSC
// ring buffer. The callback drains it at the start of every block, converts
// each click time to a sample position and hands it to the `ClickMixer`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Producer, Split};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::backend::{AudioBackend, BackendError, SilentBackend, ScheduledClick};
use crate::audio::format_conversion::write_mono_to_interleaved;
use crate::audio::parameters::AtomicF32;
use crate::audio::timing::AudioClock;
use crate::config::EngineConfig;
use crate::synth::click::ClickBank;
use crate::synth::mixer::ClickMixer;

pub type ClickProducer = ringbuf::HeapProd<ScheduledClick>;
pub type ClickConsumer = ringbuf::HeapCons<ScheduledClick>;

/// Create the click queue between the control loop and the audio callback
pub fn create_click_channel(capacity: usize) -> (ClickProducer, ClickConsumer) {
    let rb = HeapRb::<ScheduledClick>::new(capacity.max(1));
    rb.split()
}

/// Largest block the callback renders in one go; bigger device buffers are
/// processed in several passes
const MAX_BLOCK_FRAMES: usize = 4096;

/// How long `new`/`resume` wait for the audio thread to answer
const STREAM_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

enum StreamCommand {
    Play(mpsc::Sender<Result<(), BackendError>>),
    Shutdown,
}

/// What the audio thread reports once the stream is built
struct StreamInfo {
    clock: AudioClock,
    channels: usize,
    device_name: String,
}

/// Output device backend
pub struct CpalBackend {
    producer: ClickProducer,
    clock: AudioClock,
    volume: Arc<AtomicF32>,
    commands: mpsc::Sender<StreamCommand>,
    thread: Option<JoinHandle<()>>,
    channels: usize,
    device_name: String,
}

impl CpalBackend {
    /// Open the default output device. The stream is built but not playing
    /// until `resume()`.
    pub fn new(config: &EngineConfig) -> Result<Self, BackendError> {
        let (producer, consumer) = create_click_channel(config.queue_capacity);
        let volume = Arc::new(AtomicF32::new(1.0));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_volume = Arc::clone(&volume);
        let thread = thread::Builder::new()
            .name("metronome-audio".into())
            .spawn(move || {
                let stream = match Self::open_stream(consumer, thread_volume) {
                    Ok((stream, info)) => {
                        let _ = ready_tx.send(Ok(info));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                Self::run_stream_thread(stream, command_rx);
            })
            .map_err(|e| BackendError::StreamBuild(e.to_string()))?;

        let info = match ready_rx.recv_timeout(STREAM_REPLY_TIMEOUT) {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = command_tx.send(StreamCommand::Shutdown);
                return Err(BackendError::Disconnected);
            }
        };

        log::info!(
            "Audio output ready: {} ({} Hz, {} channels)",
            info.device_name,
            info.clock.sample_rate(),
            info.channels
        );

        Ok(Self {
            producer,
            clock: info.clock,
            volume,
            commands: command_tx,
            thread: Some(thread),
            channels: info.channels,
            device_name: info.device_name,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.clock.sample_rate()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    /// Runs on the audio thread: the stream must never leave it
    fn open_stream(
        consumer: ClickConsumer,
        volume: Arc<AtomicF32>,
    ) -> Result<(Stream, StreamInfo), BackendError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(BackendError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported_config = device
            .default_output_config()
            .map_err(|e| BackendError::DeviceConfig(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        log::debug!("Output config: {:?}", supported_config);

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let clock = AudioClock::new(sample_rate);
        let mixer = ClickMixer::new(ClickBank::new(sample_rate));

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                channels,
                consumer,
                mixer,
                clock.clone(),
                volume,
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                channels,
                consumer,
                mixer,
                clock.clone(),
                volume,
            ),
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config,
                channels,
                consumer,
                mixer,
                clock.clone(),
                volume,
            ),
            other => return Err(BackendError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        Ok((
            stream,
            StreamInfo {
                clock,
                channels,
                device_name,
            },
        ))
    }

    fn run_stream_thread(stream: Stream, commands: mpsc::Receiver<StreamCommand>) {
        // Ends on Shutdown or when the backend is dropped
        while let Ok(command) = commands.recv() {
            match command {
                StreamCommand::Play(reply) => {
                    let result = stream
                        .play()
                        .map_err(|e| BackendError::StreamPlay(e.to_string()));
                    let _ = reply.send(result);
                }
                StreamCommand::Shutdown => break,
            }
        }
        log::debug!("Audio stream thread exiting");
    }

    /// Build an output stream for sample type `T`
    ///
    /// The callback mixes in f32 and converts while writing the device buffer.
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        mut consumer: ClickConsumer,
        mut mixer: ClickMixer,
        clock: AudioClock,
        volume: Arc<AtomicF32>,
    ) -> Result<Stream, BackendError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = channels.max(1);
        let mut scratch = vec![0.0f32; MAX_BLOCK_FRAMES];

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // ========== SACRED ZONE ==========
                    // No allocations, No I/O, No blocking locks

                    while let Some(click) = consumer.try_pop() {
                        let start_sample = clock.seconds_to_samples(click.time);
                        mixer.trigger(start_sample, click.category);
                    }

                    let gain = volume.load();
                    for chunk in data.chunks_mut(MAX_BLOCK_FRAMES * channels) {
                        let frames = chunk.len() / channels;
                        let block = &mut scratch[..frames];
                        mixer.process(block, clock.current_sample(), gain);
                        write_mono_to_interleaved(block, chunk, channels);
                        clock.advance(frames);
                    }
                    // ========== SACRED ZONE END ==========
                },
                move |err| {
                    // Runs outside the audio callback, logging is fine here
                    log::warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| BackendError::StreamBuild(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn schedule_click(&mut self, click: ScheduledClick) -> Result<(), BackendError> {
        self.producer
            .try_push(click)
            .map_err(|click| BackendError::QueueFull { time: click.time })
    }

    fn current_clock_time(&self) -> f64 {
        self.clock.now_seconds()
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(StreamCommand::Play(reply_tx))
            .map_err(|_| BackendError::Disconnected)?;
        reply_rx
            .recv_timeout(STREAM_REPLY_TIMEOUT)
            .map_err(|_| BackendError::Disconnected)?
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume.store(volume);
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::warn!("Audio stream thread panicked");
        }
    }
}

/// Open the default output device, or fall back to a silent backend so the
/// metronome keeps running without audio
pub fn open_default_backend(config: &EngineConfig) -> Box<dyn AudioBackend + Send> {
    match CpalBackend::new(config) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            log::warn!("Audio output unavailable ({}), running silently", e);
            Box::new(SilentBackend::new())
        }
    }
}
