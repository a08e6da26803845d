//! Wake phrase detection over detector frames
//!
//! The session only sees [`WakeDetector`]. [`PhraseDetector`] gates frames by
//! RMS energy into speech segments and transcribes each finished segment to
//! look for a configured phrase.

use std::sync::Arc;

use async_trait::async_trait;

use super::frame::Frame;
use super::recorder::Utterance;
use super::stt::Transcriber;

/// Keyword spotting backend consuming fixed-size frames
#[async_trait]
pub trait WakeDetector: Send {
    /// Process one frame; true when the wake phrase was heard
    async fn process(&mut self, frame: &Frame) -> bool;

    /// Drop any partial state (called whenever the session releases audio)
    fn reset(&mut self);
}

/// Tuning for energy-based speech segmentation
#[derive(Debug, Clone, Copy)]
pub struct SegmenterSettings {
    /// RMS energy (fraction of full scale) above which a frame is speech
    pub energy_threshold: f32,
    /// Voiced samples a segment needs before it is transcribed
    pub min_speech_samples: usize,
    /// Trailing silence that ends a segment, in samples
    pub silence_samples: usize,
    /// Segments are cut off at this length, in samples
    pub max_segment_samples: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        // 0.3s, 0.5s and 3s at 16kHz
        Self {
            energy_threshold: 0.03,
            min_speech_samples: 4800,
            silence_samples: 8000,
            max_segment_samples: 48_000,
        }
    }
}

/// Whether the detector is inside a speech segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No speech seen since the last segment ended
    Idle,
    /// Accumulating a speech segment
    InSpeech,
}

/// Energy gate grouping frames into speech segments
#[derive(Debug)]
struct Segmenter {
    settings: SegmenterSettings,
    segment: Vec<i16>,
    trailing_silence: usize,
    in_speech: bool,
}

impl Segmenter {
    const fn new(settings: SegmenterSettings) -> Self {
        Self {
            settings,
            segment: Vec::new(),
            trailing_silence: 0,
            in_speech: false,
        }
    }

    /// Feed one frame; returns a finished segment worth checking
    fn feed(&mut self, samples: &[i16]) -> Option<Vec<i16>> {
        let energy = rms_energy(samples);
        let loud = energy > self.settings.energy_threshold;

        if !self.in_speech {
            if loud {
                self.in_speech = true;
                self.segment.extend_from_slice(samples);
                tracing::trace!(energy, "speech started");
            }
            return None;
        }

        self.segment.extend_from_slice(samples);
        self.trailing_silence = if loud {
            0
        } else {
            self.trailing_silence + samples.len()
        };

        if self.segment.len() >= self.settings.max_segment_samples {
            tracing::trace!(samples = self.segment.len(), "segment cut at max length");
            return Some(self.take());
        }
        if self.trailing_silence <= self.settings.silence_samples {
            return None;
        }

        let voiced = self.segment.len().saturating_sub(self.trailing_silence);
        if voiced > self.settings.min_speech_samples {
            tracing::debug!(samples = self.segment.len(), voiced, "speech segment complete");
            Some(self.take())
        } else {
            tracing::trace!(voiced, "speech too short, discarded");
            self.clear();
            None
        }
    }

    fn take(&mut self) -> Vec<i16> {
        let segment = std::mem::take(&mut self.segment);
        self.clear();
        segment
    }

    fn clear(&mut self) {
        self.segment.clear();
        self.trailing_silence = 0;
        self.in_speech = false;
    }
}

/// Detects a spoken wake phrase by transcribing energy-gated segments
pub struct PhraseDetector {
    phrases: Vec<String>,
    transcriber: Arc<dyn Transcriber>,
    segmenter: Segmenter,
}

impl PhraseDetector {
    /// Create a detector for `phrases` (matched case-insensitively)
    ///
    /// Blank phrases are ignored.
    #[must_use]
    pub fn new(
        phrases: Vec<String>,
        transcriber: Arc<dyn Transcriber>,
        settings: SegmenterSettings,
    ) -> Self {
        let phrases: Vec<String> = phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(?phrases, "phrase detector ready");

        Self {
            phrases,
            transcriber,
            segmenter: Segmenter::new(settings),
        }
    }

    /// Whether `transcript` contains one of the phrases
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        let heard = transcript.to_lowercase();
        let hit = self.phrases.iter().find(|p| heard.contains(p.as_str()));
        if let Some(phrase) = hit {
            tracing::info!(%phrase, transcript, "wake phrase heard");
        }
        hit.is_some()
    }

    /// Segmenter state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        if self.segmenter.in_speech {
            DetectorState::InSpeech
        } else {
            DetectorState::Idle
        }
    }

    /// Normalized phrases
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

#[async_trait]
impl WakeDetector for PhraseDetector {
    async fn process(&mut self, frame: &Frame) -> bool {
        let Some(samples) = self.segmenter.feed(frame.samples()) else {
            return false;
        };

        let segment = Utterance::new(samples, frame.sample_rate());
        match self.transcriber.transcribe(&segment).await {
            Ok(transcript) => {
                tracing::debug!(%transcript, "checking segment for wake phrase");
                self.matches(&transcript)
            }
            Err(e) => {
                tracing::warn!(error = %e, "wake segment transcription failed");
                false
            }
        }
    }

    fn reset(&mut self) {
        self.segmenter.clear();
    }
}

/// RMS energy of i16 samples as a fraction of full scale
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}
