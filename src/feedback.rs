//! User-facing feedback
//!
//! Announcements never fail the caller: synthesis or playback problems are
//! logged and swallowed so the session keeps running.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::config::Config;
use crate::voice::{AudioPlayback, TextToSpeech};

/// Receives short status messages meant for the user
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Deliver `text` to the user
    async fn announce(&self, text: &str);
}

/// Speaks announcements through TTS and the default output device
pub struct SpokenFeedback {
    tts: TextToSpeech,
    playback: Arc<AudioPlayback>,
}

impl SpokenFeedback {
    /// Create from an existing synthesizer and playback device
    #[must_use]
    pub fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self {
            tts,
            playback: Arc::new(playback),
        }
    }

    /// Build from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the TTS key is missing or no output device exists
    pub fn from_config(config: &Config) -> Result<Self> {
        let tts = TextToSpeech::from_config(&config.tts, &config.api_keys)?;
        let playback = AudioPlayback::new()?;
        Ok(Self::new(tts, playback))
    }

    /// Speak `text`, reporting failures
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak(&self, text: &str) -> Result<()> {
        let audio = self.tts.synthesize(text).await?;
        let playback = Arc::clone(&self.playback);

        tokio::task::spawn_blocking(move || playback.play_mp3(&audio))
            .await
            .map_err(|e| crate::Error::Audio(format!("playback task failed: {e}")))?
    }
}

#[async_trait]
impl FeedbackSink for SpokenFeedback {
    async fn announce(&self, text: &str) {
        tracing::info!(text, "speaking");
        if let Err(e) = self.speak(text).await {
            tracing::warn!(error = %e, text, "spoken feedback failed");
        }
    }
}

/// Writes announcements to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

#[async_trait]
impl FeedbackSink for LogFeedback {
    async fn announce(&self, text: &str) {
        tracing::info!(text, "feedback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_feedback_is_silent() {
        LogFeedback.announce("Sorry, I didn't catch that.").await;
    }
}
