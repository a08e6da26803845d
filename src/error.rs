//! Error types for the Friday voice loop

use thiserror::Error;

/// Result type alias for Friday operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice loop and its adapters
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (bad settings or an unusable stream format)
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio input device cannot be acquired
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// An open audio stream stopped delivering samples or reported a fault
    #[error("audio stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Audio processing error (encoding, decoding, playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Intent parsing error
    #[error("intent error: {0}")]
    Intent(String),

    /// Browser automation error
    #[error("browser error: {0}")]
    Browser(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error prevents audio acquisition outright
    ///
    /// Retrying the same cycle cannot fix these, so the session stops.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::Config(_))
    }
}
