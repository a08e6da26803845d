//! Voice command session
//!
//! A single sequential state machine drives one command cycle at a time:
//! listen for the wake phrase, record, transcribe, parse, dispatch, and
//! return to listening. Only the session decides whether a failure ends the
//! loop; every collaborator reports through its return value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::actions::ActionDispatcher;
use crate::config::Config;
use crate::feedback::FeedbackSink;
use crate::intent::{CommandIntent, IntentParser};
use crate::voice::{
    AudioInput, FrameAssembler, Recording, Transcriber, Utterance, UtteranceRecorder,
    WakeDetector, next_block,
};
use crate::{Error, Result};

/// Spoken when a recording is below the silence threshold
pub const LOW_VOLUME_MESSAGE: &str = "Low volume detected. Please speak louder.";

/// Spoken when recording fails mid-way
pub const RECORDING_FAILED_MESSAGE: &str = "Sorry, I couldn't record that. Please try again.";

/// Spoken when transcription yields nothing usable
pub const EMPTY_TRANSCRIPT_MESSAGE: &str = "Sorry, I didn't catch that.";

/// Spoken when no command could be parsed
pub const ABSENT_INTENT_MESSAGE: &str = "I didn't understand that. Please try again.";

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Between cycles, holding no resources
    Idle,
    /// Stream open, feeding frames to the wake detector
    ListeningForWake,
    /// Capturing the command utterance
    Recording,
    /// Waiting on speech-to-text
    Transcribing,
    /// Waiting on the intent parser
    ParsingIntent,
    /// Performing the action
    Dispatching,
    /// Halted by a fatal failure
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ListeningForWake => "listening_for_wake",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::ParsingIntent => "parsing_intent",
            Self::Dispatching => "dispatching",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Counters for a running session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Command cycles finished, successfully or not
    pub cycles: u64,
    /// Frames handed to the wake detector
    pub frames_processed: u64,
    /// Wake phrase hits
    pub wake_detections: u64,
    /// Listening streams re-acquired after a hiccup
    pub stream_restarts: u64,
    /// Recordings rejected as silence
    pub silent_recordings: u64,
    /// Transcriptions that produced no text
    pub empty_transcripts: u64,
    /// Transcripts no command could be parsed from
    pub absent_intents: u64,
    /// Actions that completed
    pub actions_completed: u64,
    /// Actions that reported an error
    pub actions_failed: u64,
}

/// Timing and audio parameters the session runs with
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Detector sample rate in Hz
    pub sample_rate: u32,
    /// Detector frame length in samples
    pub frame_length: usize,
    /// How often an open stream is drained
    pub poll_interval: Duration,
    /// Silence after which a stream counts as interrupted
    pub stall_timeout: Duration,
    /// Pause before re-acquiring an interrupted stream
    pub retry_delay: Duration,
    /// Fixed command recording length
    pub record_duration: Duration,
    /// Peak amplitude below which a recording is silence
    pub silence_threshold: f32,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            sample_rate: config.audio.sample_rate,
            frame_length: config.audio.frame_length,
            poll_interval: config.audio.poll_interval,
            stall_timeout: config.audio.stall_timeout,
            retry_delay: config.audio.retry_delay,
            record_duration: config.recorder.duration,
            silence_threshold: config.recorder.silence_threshold,
        }
    }
}

/// Everything a session needs, built once at startup
pub struct SessionContext {
    /// Audio and timing parameters
    pub settings: SessionSettings,
    /// Source of input streams
    pub input: Box<dyn AudioInput>,
    /// Wake phrase detector
    pub detector: Box<dyn WakeDetector>,
    /// Speech-to-text for command utterances
    pub transcriber: Arc<dyn Transcriber>,
    /// Text-to-intent parser
    pub parser: Arc<dyn IntentParser>,
    /// Action executor
    pub dispatcher: Arc<dyn ActionDispatcher>,
    /// User feedback channel
    pub feedback: Arc<dyn FeedbackSink>,
}

/// Current stage together with the data it works on
enum Stage {
    Idle,
    Listening,
    Recording,
    Transcribing(Utterance),
    Parsing(String),
    Dispatching(CommandIntent),
    Failed(Option<Error>),
}

impl Stage {
    const fn state(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Listening => SessionState::ListeningForWake,
            Self::Recording => SessionState::Recording,
            Self::Transcribing(_) => SessionState::Transcribing,
            Self::Parsing(_) => SessionState::ParsingIntent,
            Self::Dispatching(_) => SessionState::Dispatching,
            Self::Failed(_) => SessionState::Error,
        }
    }
}

/// How a listening pass ended
enum Heard {
    Wake,
    Stopped,
}

/// The voice command state machine
pub struct SessionLoop {
    ctx: SessionContext,
    stage: Stage,
    assembler: FrameAssembler,
    recorder: UtteranceRecorder,
    stats: SessionStats,
    stop: CancellationToken,
}

impl SessionLoop {
    /// Create a session in the [`SessionState::Idle`] state
    ///
    /// # Errors
    ///
    /// Returns error if the frame length is zero
    pub fn new(ctx: SessionContext) -> Result<Self> {
        let settings = &ctx.settings;
        let assembler = FrameAssembler::new(settings.frame_length, settings.sample_rate)?;
        let recorder = UtteranceRecorder::new(
            settings.silence_threshold,
            settings.poll_interval,
            settings.stall_timeout,
        );

        Ok(Self {
            ctx,
            stage: Stage::Idle,
            assembler,
            recorder,
            stats: SessionStats::default(),
            stop: CancellationToken::new(),
        })
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.stage.state()
    }

    /// Counters so far
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Token that stops [`run`](Self::run) when cancelled
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run until stopped or halted by a fatal failure
    ///
    /// # Errors
    ///
    /// Returns the fatal error that halted the session
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            sample_rate = self.ctx.settings.sample_rate,
            frame_length = self.ctx.settings.frame_length,
            "session started"
        );

        loop {
            // A pending fatal error outranks a stop request
            if self.stop.is_cancelled() && !matches!(self.stage, Stage::Failed(_)) {
                self.release();
                self.stage = Stage::Idle;
                tracing::info!(cycles = self.stats.cycles, "session stopped");
                return Ok(());
            }
            self.step().await?;
        }
    }

    /// Perform the current state's work and move to the next state
    ///
    /// # Errors
    ///
    /// Returns the fatal error when stepping the [`SessionState::Error`] state
    #[allow(clippy::future_not_send)]
    pub async fn step(&mut self) -> Result<SessionState> {
        let from = self.state();
        let stage = std::mem::replace(&mut self.stage, Stage::Idle);

        self.stage = match stage {
            Stage::Idle => {
                self.release();
                Stage::Listening
            }
            Stage::Listening => self.listen_for_wake().await,
            Stage::Recording => self.record().await,
            Stage::Transcribing(utterance) => self.transcribe(&utterance).await,
            Stage::Parsing(text) => self.parse(&text).await,
            Stage::Dispatching(intent) => self.dispatch(&intent).await,
            Stage::Failed(error) => {
                self.release();
                self.stage = Stage::Failed(None);
                let error = error.unwrap_or_else(|| {
                    Error::DeviceUnavailable("session already halted".to_string())
                });
                tracing::error!(error = %error, "session halted");
                return Err(error);
            }
        };

        let to = self.state();
        if from != to {
            tracing::debug!(%from, %to, "state transition");
        }
        Ok(to)
    }

    #[allow(clippy::future_not_send)]
    async fn listen_for_wake(&mut self) -> Stage {
        let heard = self.listen().await;

        // Stream is already gone; drop partial frames and detector state too
        self.release();

        match heard {
            Ok(Heard::Wake) => {
                self.stats.wake_detections += 1;
                tracing::info!("wake phrase detected");
                Stage::Recording
            }
            Ok(Heard::Stopped) => Stage::Idle,
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "cannot listen for wake phrase");
                Stage::Failed(Some(e))
            }
            Err(e) => {
                self.stats.stream_restarts += 1;
                tracing::warn!(
                    error = %e,
                    retry_ms = self.ctx.settings.retry_delay.as_millis(),
                    "listening stream interrupted, re-acquiring"
                );
                tokio::select! {
                    () = self.stop.cancelled() => {}
                    () = tokio::time::sleep(self.ctx.settings.retry_delay) => {}
                }
                Stage::Listening
            }
        }
    }

    /// Open a stream and feed frames to the detector until a hit or stop
    ///
    /// The stream is dropped before this returns.
    #[allow(clippy::future_not_send)]
    async fn listen(&mut self) -> Result<Heard> {
        let mut source = self.ctx.input.open()?;
        self.assembler.check_spec(&source.spec())?;

        let poll = self.ctx.settings.poll_interval;
        let stall = self.ctx.settings.stall_timeout;
        tracing::debug!("listening for wake phrase");

        loop {
            let block = tokio::select! {
                () = self.stop.cancelled() => return Ok(Heard::Stopped),
                block = next_block(source.as_mut(), poll, stall) => block?,
            };

            for frame in self.assembler.push(block) {
                self.stats.frames_processed += 1;
                if self.ctx.detector.process(&frame).await {
                    tracing::debug!(frame = self.stats.frames_processed, "detector fired");
                    return Ok(Heard::Wake);
                }
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn record(&mut self) -> Stage {
        let settings = &self.ctx.settings;
        let recording = self
            .recorder
            .record(
                self.ctx.input.as_ref(),
                settings.record_duration,
                settings.sample_rate,
            )
            .await;

        match recording {
            Ok(Recording::Utterance(utterance)) => Stage::Transcribing(utterance),
            Ok(Recording::Silence { peak }) => {
                self.stats.silent_recordings += 1;
                tracing::warn!(peak, "recording below silence threshold");
                self.finish_cycle(LOW_VOLUME_MESSAGE).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "recording failed");
                self.finish_cycle(RECORDING_FAILED_MESSAGE).await
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn transcribe(&mut self, utterance: &Utterance) -> Stage {
        let text = match self.ctx.transcriber.transcribe(utterance).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                String::new()
            }
        };

        if text.is_empty() {
            self.stats.empty_transcripts += 1;
            tracing::warn!("no speech in recording");
            return self.finish_cycle(EMPTY_TRANSCRIPT_MESSAGE).await;
        }

        tracing::info!(transcript = %text, "command heard");
        Stage::Parsing(text)
    }

    #[allow(clippy::future_not_send)]
    async fn parse(&mut self, text: &str) -> Stage {
        let intent = match self.ctx.parser.parse(text).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "intent parsing failed");
                None
            }
        };

        match intent {
            Some(intent) => {
                tracing::info!(action = intent.kind(), "command parsed");
                Stage::Dispatching(intent)
            }
            None => {
                self.stats.absent_intents += 1;
                tracing::warn!(transcript = %text, "no command understood");
                self.finish_cycle(ABSENT_INTENT_MESSAGE).await
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn dispatch(&mut self, intent: &CommandIntent) -> Stage {
        let message = match self.ctx.dispatcher.dispatch(intent).await {
            Ok(confirmation) => {
                self.stats.actions_completed += 1;
                tracing::info!(action = intent.kind(), "action completed");
                confirmation
            }
            Err(e) => {
                self.stats.actions_failed += 1;
                tracing::warn!(action = intent.kind(), error = %e, "action failed");
                e.feedback()
            }
        };

        self.ctx.feedback.announce(&message).await;
        self.stats.cycles += 1;
        Stage::Idle
    }

    /// End a cycle early: tell the user and go back to listening
    #[allow(clippy::future_not_send)]
    async fn finish_cycle(&mut self, message: &str) -> Stage {
        self.ctx.feedback.announce(message).await;
        self.stats.cycles += 1;
        Stage::Listening
    }

    /// Drop buffered samples and detector state
    fn release(&mut self) {
        self.assembler.clear();
        self.ctx.detector.reset();
    }
}
