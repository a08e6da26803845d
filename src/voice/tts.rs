//! Text-to-speech (TTS) for spoken feedback
//!
//! Both backends return MP3 bytes, which [`super::AudioPlayback`] decodes.

use serde::{Deserialize, Serialize};

use crate::config::{ApiKeys, TtsConfig};
use crate::{Error, Result};

/// TTS provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// `OpenAI` speech API
    #[default]
    OpenAI,
    /// `ElevenLabs`
    ElevenLabs,
}

impl TtsProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }

    /// Voice used when none is configured
    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::OpenAI => "nova",
            // "Rachel"
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }

    const fn key_name(self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::ElevenLabs => "ELEVENLABS_API_KEY",
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    provider: TtsProvider,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
}

impl TextToSpeech {
    /// Create a synthesizer
    ///
    /// `speed` is clamped to the 0.25 to 4.0 range `OpenAI` accepts and is
    /// ignored by `ElevenLabs`.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        provider: TtsProvider,
        api_key: String,
        model: String,
        voice: String,
        speed: f32,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} required for spoken feedback",
                provider.key_name()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
            voice,
            speed: speed.clamp(0.25, 4.0),
        })
    }

    /// Create a synthesizer for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(config: &TtsConfig, keys: &ApiKeys) -> Result<Self> {
        let key = match config.provider {
            TtsProvider::OpenAI => keys.openai.clone(),
            TtsProvider::ElevenLabs => keys.elevenlabs.clone(),
        };

        Self::new(
            config.provider,
            key.unwrap_or_default(),
            config.model.clone(),
            config.voice.clone(),
            config.speed,
        )
    }

    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = ?self.provider, chars = text.len(), "synthesizing speech");

        let request = match self.provider {
            TtsProvider::OpenAI => self
                .client
                .post("https://api.openai.com/v1/audio/speech")
                .bearer_auth(&self.api_key)
                .json(&OpenAiSpeech {
                    model: &self.model,
                    input: text,
                    voice: &self.voice,
                    speed: self.speed,
                }),
            TtsProvider::ElevenLabs => self
                .client
                .post(format!(
                    "https://api.elevenlabs.io/v1/text-to-speech/{}",
                    self.voice
                ))
                .header("xi-api-key", &self.api_key)
                .header("Accept", "audio/mpeg")
                .json(&ElevenLabsSpeech {
                    text,
                    model_id: &self.model,
                }),
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("{:?} error {status}: {body}", self.provider)));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[derive(Serialize)]
struct OpenAiSpeech<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

#[derive(Serialize)]
struct ElevenLabsSpeech<'a> {
    text: &'a str,
    model_id: &'a str,
}
