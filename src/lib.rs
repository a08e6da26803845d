//! Friday - wake-word voice command assistant
//!
//! This library provides the pieces of a hands-free command loop:
//! - Audio capture, framing and fixed-length command recording
//! - Wake phrase detection, speech-to-text and text-to-speech
//! - Command intent parsing and action dispatch
//! - The session state machine that ties them together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     SessionLoop                       │
//! │  Idle → Listening → Recording → Transcribing → ...   │
//! └───────┬───────────────┬──────────────────┬───────────┘
//!         │               │                  │
//! ┌───────▼───────┐ ┌─────▼──────────┐ ┌─────▼──────────┐
//! │  AudioInput   │ │ Transcriber    │ │ ActionDispatch │
//! │  FrameAssembl │ │ IntentParser   │ │ FeedbackSink   │
//! │  WakeDetector │ │ (OpenAI, etc.) │ │ (browser, TTS) │
//! └───────────────┘ └────────────────┘ └────────────────┘
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod feedback;
pub mod intent;
pub mod session;
pub mod voice;

pub use actions::{ActionDispatcher, ActionError, CommandDispatcher};
pub use config::Config;
pub use error::{Error, Result};
pub use feedback::{FeedbackSink, LogFeedback, SpokenFeedback};
pub use intent::{ChatIntentParser, CommandIntent, IntentParser};
pub use session::{SessionContext, SessionLoop, SessionSettings, SessionState, SessionStats};
