//! Configuration management for the Friday voice loop
//!
//! Built once at startup and passed by reference into the session and the
//! adapters. Precedence: defaults, then the TOML file, then environment.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::voice::{
    DEFAULT_FRAME_LENGTH, DEFAULT_RECORD_DURATION, DEFAULT_SILENCE_THRESHOLD, SAMPLE_RATE,
    SegmenterSettings, SttProvider, TtsProvider, samples_for,
};
use crate::{Error, Result};

use self::file::FridayConfigFile;

/// Friday configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Audio capture and framing
    pub audio: AudioConfig,

    /// Command recording
    pub recorder: RecorderConfig,

    /// Wake phrase detection
    pub wake: WakeConfig,

    /// Speech-to-text
    pub stt: SttConfig,

    /// Intent parsing
    pub intent: IntentConfig,

    /// Spoken feedback
    pub tts: TtsConfig,

    /// Action backends
    pub actions: ActionsConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Audio capture and framing configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (the detector's rate)
    pub sample_rate: u32,

    /// Detector frame length in samples
    pub frame_length: usize,

    /// Samples the capture ring holds before dropping input
    pub ring_capacity: usize,

    /// How often the capture ring is drained
    pub poll_interval: Duration,

    /// Device silence after which a stream counts as interrupted
    pub stall_timeout: Duration,

    /// Pause before re-acquiring an interrupted stream
    pub retry_delay: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frame_length: DEFAULT_FRAME_LENGTH,
            ring_capacity: SAMPLE_RATE as usize * 2,
            poll_interval: Duration::from_millis(20),
            stall_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Command recording configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Fixed recording length
    pub duration: Duration,

    /// Peak amplitude (0.0 to 1.0) below which a recording is silence
    pub silence_threshold: f32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_RECORD_DURATION,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }
}

/// Wake phrase configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Accepted wake phrases
    pub phrases: Vec<String>,

    /// RMS energy above which a frame counts as speech
    pub energy_threshold: f32,

    /// Minimum speech before a segment is checked
    pub min_speech: Duration,

    /// Trailing silence that ends a segment
    pub trailing_silence: Duration,

    /// Longest segment checked for the wake phrase
    pub max_segment: Duration,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: vec!["friday".to_string()],
            energy_threshold: 0.03,
            min_speech: Duration::from_millis(300),
            trailing_silence: Duration::from_millis(500),
            max_segment: Duration::from_secs(3),
        }
    }
}

impl WakeConfig {
    /// Segmenter settings in samples at `sample_rate`
    #[must_use]
    pub fn segmenter(&self, sample_rate: u32) -> SegmenterSettings {
        SegmenterSettings {
            energy_threshold: self.energy_threshold,
            min_speech_samples: samples_for(self.min_speech, sample_rate),
            silence_samples: samples_for(self.trailing_silence, sample_rate),
            max_segment_samples: samples_for(self.max_segment, sample_rate),
        }
    }
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Backend
    pub provider: SttProvider,

    /// Model (e.g. "whisper-1", "nova-2")
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: SttProvider::Whisper,
            model: SttProvider::Whisper.default_model().to_string(),
        }
    }
}

/// Intent parsing configuration
#[derive(Debug, Clone)]
pub struct IntentConfig {
    /// Chat model used for intent extraction
    pub model: String,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
        }
    }
}

/// Spoken feedback configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Speak feedback aloud (false logs it only)
    pub enabled: bool,

    /// Backend
    pub provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: TtsProvider::OpenAI,
            model: TtsProvider::OpenAI.default_model().to_string(),
            voice: TtsProvider::OpenAI.default_voice().to_string(),
            speed: 1.0,
        }
    }
}

/// Action backend configuration
#[derive(Debug, Clone)]
pub struct ActionsConfig {
    /// Playlist links file (`{"youtube": {"name": "url"}}`)
    pub links_path: PathBuf,

    /// How long an opened page is kept alive
    pub browser_hold: Duration,

    /// Chrome/Chromium executable (auto-detected when unset)
    pub chrome_path: Option<PathBuf>,

    /// Run the browser headless
    pub headless: bool,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            links_path: PathBuf::from("links.json"),
            browser_hold: Duration::from_secs(5),
            chrome_path: None,
            headless: true,
        }
    }
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, chat, TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `OpenWeatherMap` API key
    pub openweather: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Presence only; keys never reach the logs
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.is_some())
            .field("deepgram", &self.deepgram.is_some())
            .field("elevenlabs", &self.elevenlabs.is_some())
            .field("openweather", &self.openweather.is_some())
            .finish()
    }
}

impl Config {
    /// Load configuration from the config file and the process environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file is invalid or validation fails
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = file::load_config_file(config_path)?;

        let mut config = Self::default();
        config.apply_file(file);
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Overlay values present in a config file
    pub fn apply_file(&mut self, file: FridayConfigFile) {
        let audio = file.audio;
        if let Some(v) = audio.sample_rate {
            self.audio.sample_rate = v;
        }
        if let Some(v) = audio.frame_length {
            self.audio.frame_length = v;
        }
        if let Some(v) = audio.ring_capacity {
            self.audio.ring_capacity = v;
        }
        if let Some(v) = audio.poll_interval_ms {
            self.audio.poll_interval = Duration::from_millis(v);
        }
        if let Some(v) = audio.stall_timeout_ms {
            self.audio.stall_timeout = Duration::from_millis(v);
        }
        if let Some(v) = audio.retry_delay_ms {
            self.audio.retry_delay = Duration::from_millis(v);
        }

        if let Some(v) = file.recorder.duration_secs {
            if v.is_finite() && v > 0.0 {
                self.recorder.duration = Duration::from_secs_f64(v);
            } else {
                tracing::warn!(duration_secs = v, "ignoring invalid recording duration");
            }
        }
        if let Some(v) = file.recorder.silence_threshold {
            self.recorder.silence_threshold = v;
        }

        let wake = file.wake;
        if let Some(v) = wake.phrases {
            self.wake.phrases = v;
        }
        if let Some(v) = wake.energy_threshold {
            self.wake.energy_threshold = v;
        }
        if let Some(v) = wake.min_speech_ms {
            self.wake.min_speech = Duration::from_millis(v);
        }
        if let Some(v) = wake.trailing_silence_ms {
            self.wake.trailing_silence = Duration::from_millis(v);
        }
        if let Some(v) = wake.max_segment_ms {
            self.wake.max_segment = Duration::from_millis(v);
        }

        if let Some(v) = file.stt.provider {
            self.stt.provider = v;
            self.stt.model = v.default_model().to_string();
        }
        if let Some(v) = file.stt.model {
            self.stt.model = v;
        }

        if let Some(v) = file.intent.model {
            self.intent.model = v;
        }

        let tts = file.tts;
        if let Some(v) = tts.enabled {
            self.tts.enabled = v;
        }
        if let Some(v) = tts.provider {
            self.tts.provider = v;
            self.tts.model = v.default_model().to_string();
            if v == TtsProvider::ElevenLabs {
                self.tts.voice = v.default_voice().to_string();
            }
        }
        if let Some(v) = tts.model {
            self.tts.model = v;
        }
        if let Some(v) = tts.voice {
            self.tts.voice = v;
        }
        if let Some(v) = tts.speed {
            self.tts.speed = v;
        }

        let actions = file.actions;
        if let Some(v) = actions.links_path {
            self.actions.links_path = v;
        }
        if let Some(v) = actions.browser_hold_secs {
            self.actions.browser_hold = Duration::from_secs(v);
        }
        if actions.chrome_path.is_some() {
            self.actions.chrome_path = actions.chrome_path;
        }
        if let Some(v) = actions.headless {
            self.actions.headless = v;
        }

        let keys = file.api_keys;
        self.api_keys.openai = keys.openai.or(self.api_keys.openai.take());
        self.api_keys.deepgram = keys.deepgram.or(self.api_keys.deepgram.take());
        self.api_keys.elevenlabs = keys.elevenlabs.or(self.api_keys.elevenlabs.take());
        self.api_keys.openweather = keys.openweather.or(self.api_keys.openweather.take());
    }

    /// Overlay environment variables, read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("OPENAI_API_KEY") {
            self.api_keys.openai = Some(v);
        }
        if let Some(v) = var("DEEPGRAM_API_KEY") {
            self.api_keys.deepgram = Some(v);
        }
        if let Some(v) = var("ELEVENLABS_API_KEY") {
            self.api_keys.elevenlabs = Some(v);
        }
        if let Some(v) = var("OPENWEATHER_API_KEY") {
            self.api_keys.openweather = Some(v);
        }

        if let Some(v) = var("FRIDAY_WAKE_PHRASE") {
            self.wake.phrases = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = var("FRIDAY_LINKS_PATH") {
            self.actions.links_path = PathBuf::from(v);
        }
        if let Some(v) = var("FRIDAY_STT_MODEL") {
            self.stt.model = v;
        }
        if let Some(v) = var("FRIDAY_INTENT_MODEL") {
            self.intent.model = v;
        }
        if let Some(v) = var("FRIDAY_TTS_MODEL") {
            self.tts.model = v;
        }
        if let Some(v) = var("FRIDAY_TTS_VOICE") {
            self.tts.voice = v;
        }
        if let Some(v) = var("FRIDAY_RECORD_SECONDS") {
            match v.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => {
                    self.recorder.duration = Duration::from_secs_f64(secs);
                }
                _ => tracing::warn!(value = %v, "ignoring invalid FRIDAY_RECORD_SECONDS"),
            }
        }
    }

    /// Check settings the audio pipeline depends on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if self.audio.frame_length == 0 {
            return Err(Error::Config("audio.frame_length must be positive".to_string()));
        }
        if self.audio.ring_capacity < self.audio.frame_length {
            return Err(Error::Config(
                "audio.ring_capacity must hold at least one frame".to_string(),
            ));
        }
        if self.audio.poll_interval.is_zero() {
            return Err(Error::Config("audio.poll_interval must be positive".to_string()));
        }
        if self.audio.stall_timeout <= self.audio.poll_interval {
            return Err(Error::Config(
                "audio.stall_timeout must be longer than audio.poll_interval".to_string(),
            ));
        }
        if self.audio.retry_delay.is_zero() {
            return Err(Error::Config("audio.retry_delay must be positive".to_string()));
        }
        if self.recorder.duration.is_zero() {
            return Err(Error::Config("recorder.duration must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.recorder.silence_threshold) {
            return Err(Error::Config(
                "recorder.silence_threshold must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.wake.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::Config("at least one wake phrase is required".to_string()));
        }
        Ok(())
    }
}
