// Format conversion for output streams and WAV export
//
// Clicks are rendered in f32 internally:
// - realtime output converts to the device format (F32, I16, U16) through
//   cpal's `FromSample` while filling the interleaved buffer
// - export converts to 16-bit PCM with `f32_to_i16`
//
// Everything here is allocation-free and safe to call from the audio callback.

use cpal::{FromSample, Sample};

/// Convert f32 sample to 16-bit PCM
///
/// Scales by `i16::MAX` and rounds; values outside [-1.0, 1.0] are clamped.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * i16::MAX as f32).round() as i16
}

/// Write one mono sample to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(sample: f32, output_frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    let converted = T::from_sample(sample);
    for channel_sample in output_frame.iter_mut() {
        *channel_sample = converted;
    }
}

/// Spread a mono block over an interleaved device buffer
///
/// Writes `min(mono.len(), output.len() / channels)` frames; any remaining
/// frames are filled with silence.
#[inline]
pub fn write_mono_to_interleaved<T>(mono: &[f32], output: &mut [T], channels: usize)
where
    T: Sample + FromSample<f32>,
{
    let channels = channels.max(1);
    let mut frames = output.chunks_mut(channels);

    for (&sample, frame) in mono.iter().zip(frames.by_ref()) {
        write_mono_to_interleaved_frame(sample, frame);
    }
    for frame in frames {
        write_mono_to_interleaved_frame(0.0, frame);
    }
}
