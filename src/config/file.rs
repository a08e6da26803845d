//! TOML configuration file loading
//!
//! Supports `~/.config/friday/config.toml` (or `--config PATH`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::voice::{SttProvider, TtsProvider};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FridayConfigFile {
    /// Audio capture and framing
    pub audio: AudioFileConfig,

    /// Command recording
    pub recorder: RecorderFileConfig,

    /// Wake phrase detection
    pub wake: WakeFileConfig,

    /// Speech-to-text
    pub stt: SttFileConfig,

    /// Intent parsing
    pub intent: IntentFileConfig,

    /// Spoken feedback
    pub tts: TtsFileConfig,

    /// Action backends
    pub actions: ActionsFileConfig,

    /// API keys for external services
    pub api_keys: ApiKeysFileConfig,
}

/// Audio capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Detector frame length in samples
    pub frame_length: Option<usize>,

    /// Capacity of the capture ring in samples
    pub ring_capacity: Option<usize>,

    /// How often the capture ring is drained
    pub poll_interval_ms: Option<u64>,

    /// Silence from the device after which a stream counts as interrupted
    pub stall_timeout_ms: Option<u64>,

    /// Pause before re-acquiring an interrupted stream
    pub retry_delay_ms: Option<u64>,
}

/// Command recording configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecorderFileConfig {
    /// Recording length in seconds
    pub duration_secs: Option<f64>,

    /// Peak amplitude (0.0 to 1.0) below which a recording is silence
    pub silence_threshold: Option<f32>,
}

/// Wake phrase configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Wake phrases (e.g. `["friday"]`)
    pub phrases: Option<Vec<String>>,

    /// RMS energy above which a frame counts as speech
    pub energy_threshold: Option<f32>,

    /// Minimum speech before a segment is checked
    pub min_speech_ms: Option<u64>,

    /// Trailing silence that ends a segment
    pub trailing_silence_ms: Option<u64>,

    /// Longest segment checked for the wake phrase
    pub max_segment_ms: Option<u64>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Backend ("whisper" or "deepgram")
    pub provider: Option<SttProvider>,

    /// Model (e.g. "whisper-1")
    pub model: Option<String>,
}

/// Intent parsing configuration
#[derive(Debug, Default, Deserialize)]
pub struct IntentFileConfig {
    /// Chat model used for intent extraction
    pub model: Option<String>,
}

/// Spoken feedback configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Speak feedback aloud (false logs it only)
    pub enabled: Option<bool>,

    /// Backend ("openai" or "elevenlabs")
    pub provider: Option<TtsProvider>,

    /// TTS model (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speed multiplier
    pub speed: Option<f32>,
}

/// Action backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct ActionsFileConfig {
    /// Path to the playlist links JSON file
    pub links_path: Option<PathBuf>,

    /// How long an opened page is kept alive
    pub browser_hold_secs: Option<u64>,

    /// Chrome/Chromium executable
    pub chrome_path: Option<PathBuf>,

    /// Run the browser headless
    pub headless: Option<bool>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub openweather: Option<String>,
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<FridayConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file
///
/// An explicit path must exist. Without one, the standard path is used if
/// present and defaults otherwise.
///
/// # Errors
///
/// Returns error if an explicit file is missing, or any file fails to parse
pub fn load_config_file(explicit: Option<&Path>) -> Result<FridayConfigFile> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return read_config_file(path);
    }

    match config_file_path() {
        Some(path) if path.exists() => read_config_file(&path),
        _ => Ok(FridayConfigFile::default()),
    }
}

/// Return the config file path: `~/.config/friday/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "friday", "friday")
        .map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let file: FridayConfigFile = toml::from_str(
            r#"
            [audio]
            frame_length = 1024

            [stt]
            provider = "deepgram"

            [wake]
            phrases = ["hey friday", "friday"]
            "#,
        )
        .unwrap();

        assert_eq!(file.audio.frame_length, Some(1024));
        assert_eq!(file.audio.sample_rate, None);
        assert_eq!(file.stt.provider, Some(SttProvider::Deepgram));
        assert_eq!(file.wake.phrases.unwrap().len(), 2);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = load_config_file(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recorder]\nduration_secs = 3.5\n").unwrap();

        let file = load_config_file(Some(&path)).unwrap();
        assert_eq!(file.recorder.duration_secs, Some(3.5));
    }
}
