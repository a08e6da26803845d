//! Speech-to-text (STT) processing

use async_trait::async_trait;
use serde::Deserialize;

use super::recorder::Utterance;
use crate::config::{ApiKeys, SttConfig};
use crate::{Error, Result};

/// Converts a recorded utterance to text
///
/// An empty string is a valid answer (nothing intelligible was said).
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails
    async fn transcribe(&self, utterance: &Utterance) -> Result<String>;
}

/// STT provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }

    const fn key_name(self) -> &'static str {
        match self {
            Self::Whisper => "OPENAI_API_KEY",
            Self::Deepgram => "DEEPGRAM_API_KEY",
        }
    }
}

/// Transcribes WAV audio through a hosted STT API
pub struct SpeechToText {
    client: reqwest::Client,
    provider: SttProvider,
    api_key: String,
    model: String,
}

impl SpeechToText {
    /// Create a transcriber
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(provider: SttProvider, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} required for transcription",
                provider.key_name()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            api_key,
            model,
        })
    }

    /// Create a transcriber for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(config: &SttConfig, keys: &ApiKeys) -> Result<Self> {
        let key = match config.provider {
            SttProvider::Whisper => keys.openai.clone(),
            SttProvider::Deepgram => keys.deepgram.clone(),
        };
        Self::new(config.provider, key.unwrap_or_default(), config.model.clone())
    }

    /// Transcribe WAV bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn transcribe_wav(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(provider = ?self.provider, audio_bytes = audio.len(), "transcribing");

        let request = match self.provider {
            SttProvider::Whisper => {
                let file = reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("command.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .part("file", file)
                    .text("model", self.model.clone());

                self.client
                    .post("https://api.openai.com/v1/audio/transcriptions")
                    .bearer_auth(&self.api_key)
                    .multipart(form)
            }
            SttProvider::Deepgram => self
                .client
                .post("https://api.deepgram.com/v1/listen")
                .query(&[("model", self.model.as_str()), ("punctuate", "true")])
                .header("Authorization", format!("Token {}", self.api_key))
                .header("Content-Type", "audio/wav")
                .body(audio.to_vec()),
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "STT request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::Stt(format!("{:?} API error {status}: {body}", self.provider)));
        }

        let body = response.text().await?;
        let transcript = match self.provider {
            SttProvider::Whisper => parse_whisper(&body)?,
            SttProvider::Deepgram => parse_deepgram(&body)?,
        };

        tracing::debug!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, utterance: &Utterance) -> Result<String> {
        let wav = utterance.to_wav()?;
        let text = self.transcribe_wav(&wav).await?;
        Ok(text.trim().to_string())
    }
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

fn parse_whisper(body: &str) -> Result<String> {
    let response: WhisperResponse = serde_json::from_str(body)?;
    Ok(response.text)
}

/// First alternative of the first channel; no alternatives means no speech
fn parse_deepgram(body: &str) -> Result<String> {
    let response: DeepgramResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default())
}
