//! Speaker output for spoken feedback and test tones
//!
//! An output stream exists only while one clip plays, so playback never
//! competes with an input stream the session holds.

use std::io::Cursor;
use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Output rate; both TTS backends deliver 24kHz MP3
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Extra wait past the clip length before giving up on the device
const DRAIN_MARGIN: Duration = Duration::from_millis(500);

/// Mono clip player on the default output device
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Probe the default output device for a usable stream config
    ///
    /// Mono is preferred; stereo devices get the clip on both channels.
    ///
    /// # Errors
    ///
    /// Returns error if there is no output device or it cannot run at 24kHz
    pub fn new() -> Result<Self> {
        let device = output_device()?;
        let rate = SampleRate(PLAYBACK_SAMPLE_RATE);

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .collect();

        let range = ranges
            .iter()
            .find(|c| c.channels() == 1)
            .or_else(|| ranges.iter().find(|c| c.channels() == 2))
            .cloned()
            .ok_or_else(|| Error::Audio(format!("no mono or stereo output at {rate:?}")))?;

        let config = range.with_sample_rate(rate).config();
        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "playback device ready"
        );

        Ok(Self { config })
    }

    /// Decode and play an MP3 clip, blocking until it ends
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        self.play_samples(decode_mp3(mp3_data)?)
    }

    /// Play mono samples in -1.0..=1.0, blocking until they end
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub fn play_samples(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = output_device()?;
        let channels = usize::from(self.config.channels);
        let clip_len = samples.len();

        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
        let mut done_tx = Some(done_tx);
        let mut clip = samples.into_iter();

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = clip.next().unwrap_or_else(|| {
                            if let Some(tx) = done_tx.take() {
                                let _ = tx.try_send(());
                            }
                            0.0
                        });
                        frame.fill(sample);
                    }
                },
                |err| tracing::error!(error = %err, "playback stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let limit = clip_duration(clip_len) + DRAIN_MARGIN;
        if done_rx.recv_timeout(limit).is_err() {
            tracing::warn!(limit_ms = limit.as_millis(), "playback did not finish in time");
        }

        // Device still holds its last buffer
        std::thread::sleep(Duration::from_millis(100));
        drop(stream);

        tracing::debug!(samples = clip_len, "clip played");
        Ok(())
    }
}

fn output_device() -> Result<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))
}

#[allow(clippy::cast_precision_loss)]
fn clip_duration(samples: usize) -> Duration {
    Duration::from_secs_f64(samples as f64 / f64::from(PLAYBACK_SAMPLE_RATE))
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut clip = Vec::new();

    loop {
        let frame = match decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3::Error::Eof) => return Ok(clip),
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        };
        downmix(&frame.data, frame.channels.max(1), &mut clip);
    }
}

/// Average interleaved channels into normalized mono
#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[i16], channels: usize, out: &mut Vec<f32>) {
    out.extend(interleaved.chunks(channels).map(|frame| {
        let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32768.0).sum();
        sum / frame.len() as f32
    }));
}

/// Generate a sine tone for speaker checks
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sine_tone(frequency: f32, duration: Duration, amplitude: f32) -> Vec<f32> {
    let count = crate::voice::samples_for(duration, PLAYBACK_SAMPLE_RATE);
    (0..count)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_empty() {
        assert!(decode_mp3(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mut out = Vec::new();
        downmix(&[16384, 0, -16384, -16384], 2, &mut out);
        assert_eq!(out, vec![0.25, -0.5]);

        out.clear();
        downmix(&[16384, -32768], 1, &mut out);
        assert_eq!(out, vec![0.5, -1.0]);
    }

    #[test]
    fn test_clip_duration() {
        assert_eq!(clip_duration(24_000), Duration::from_secs(1));
        assert_eq!(clip_duration(12_000), Duration::from_millis(500));
    }

    #[test]
    fn test_sine_tone_shape() {
        let tone = sine_tone(440.0, Duration::from_millis(100), 0.5);
        assert_eq!(tone.len(), 2400);
        assert!(tone.iter().all(|s| s.abs() <= 0.5));
    }
}
