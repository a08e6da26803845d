//! Fixed-duration command recording
//!
//! Recording always runs for the full duration. The silence guard looks at
//! the peak amplitude of the finished segment, never at partial audio.

use std::time::Duration;

use super::capture::{AudioInput, next_block};
use crate::{Error, Result};

/// Default command recording length
pub const DEFAULT_RECORD_DURATION: Duration = Duration::from_secs(5);

/// Default peak amplitude (fraction of full scale) below which a recording
/// counts as silence
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;

/// One recorded command segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl Utterance {
    /// Wrap recorded samples
    #[must_use]
    pub const fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Recorded samples
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Sample rate of the recording
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the recording
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Peak absolute amplitude as a fraction of full scale
    #[must_use]
    pub fn peak(&self) -> f32 {
        peak_amplitude(&self.samples)
    }

    /// Encode as 16-bit mono WAV for STT APIs
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// Outcome of a recording
#[derive(Debug, Clone, PartialEq)]
pub enum Recording {
    /// Audio loud enough to transcribe
    Utterance(Utterance),
    /// Peak amplitude stayed under the silence threshold
    Silence {
        /// Measured peak, as a fraction of full scale
        peak: f32,
    },
}

/// Records bounded command utterances after a wake detection
#[derive(Debug, Clone)]
pub struct UtteranceRecorder {
    silence_threshold: f32,
    poll_interval: Duration,
    stall_timeout: Duration,
}

impl UtteranceRecorder {
    /// Create a recorder
    #[must_use]
    pub const fn new(
        silence_threshold: f32,
        poll_interval: Duration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            silence_threshold,
            poll_interval,
            stall_timeout,
        }
    }

    /// Record `max_duration` of audio from a freshly opened stream
    ///
    /// The stream is released before this returns.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened, has the wrong format,
    /// or stalls mid-recording
    #[allow(clippy::future_not_send)]
    pub async fn record(
        &self,
        input: &dyn AudioInput,
        max_duration: Duration,
        sample_rate: u32,
    ) -> Result<Recording> {
        let target = samples_for(max_duration, sample_rate);
        let mut source = input.open()?;

        let spec = source.spec();
        if spec.channels != 1 || spec.sample_rate != sample_rate {
            return Err(Error::Config(format!(
                "recording needs mono {sample_rate}Hz, stream is {}ch {}Hz",
                spec.channels, spec.sample_rate
            )));
        }

        tracing::debug!(target_samples = target, "recording command");

        let mut samples = Vec::with_capacity(target);
        while samples.len() < target {
            let block = next_block(source.as_mut(), self.poll_interval, self.stall_timeout).await?;
            let take = (target - samples.len()).min(block.len());
            samples.extend_from_slice(&block.samples()[..take]);
        }
        drop(source);

        let utterance = Utterance::new(samples, sample_rate);
        let peak = utterance.peak();

        if peak < self.silence_threshold {
            tracing::debug!(peak, threshold = self.silence_threshold, "recording is silent");
            return Ok(Recording::Silence { peak });
        }

        tracing::debug!(peak, duration_ms = utterance.duration().as_millis(), "recording complete");
        Ok(Recording::Utterance(utterance))
    }
}

/// Number of samples covering `duration` at `sample_rate`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Peak absolute amplitude of i16 samples as a fraction of full scale
#[must_use]
pub fn peak_amplitude(samples: &[i16]) -> f32 {
    let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
    f32::from(peak) / 32768.0
}

/// Encode i16 samples as 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
