//! Shared test utilities: scripted audio and collaborators

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use friday::voice::{
    AudioBlock, AudioInput, Frame, FrameSource, SAMPLE_RATE, StreamSpec, Transcriber, Utterance,
    WakeDetector,
};
use friday::{
    ActionDispatcher, ActionError, CommandIntent, Error, FeedbackSink, IntentParser, Result,
    SessionContext, SessionSettings,
};

/// Settings with short timings so tests finish quickly
#[must_use]
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        sample_rate: SAMPLE_RATE,
        frame_length: 512,
        poll_interval: Duration::from_millis(1),
        stall_timeout: Duration::from_millis(30),
        retry_delay: Duration::from_millis(1),
        record_duration: Duration::from_millis(10),
        silence_threshold: 0.01,
    }
}

/// Block of `len` samples all equal to `level`
#[must_use]
pub fn block(len: usize, level: i16) -> AudioBlock {
    AudioBlock::new(vec![level; len], StreamSpec::mono(SAMPLE_RATE))
}

/// Blocks loud enough to pass the silence check for a recording
#[must_use]
pub fn loud_recording() -> Vec<AudioBlock> {
    vec![block(160, 8000)]
}

/// Blocks below the silence threshold
#[must_use]
pub fn quiet_recording() -> Vec<AudioBlock> {
    vec![block(160, 10)]
}

/// What one `open` call on [`ScriptedInput`] does
pub enum OpenScript {
    /// Device cannot be acquired
    Unavailable,
    /// Stream with the given format and reads; `Err` reads fault the stream
    Stream(StreamSpec, Vec<Result<AudioBlock>>),
}

impl OpenScript {
    /// Mono stream at the default rate delivering `blocks`
    #[must_use]
    pub fn blocks(blocks: Vec<AudioBlock>) -> Self {
        Self::Stream(
            StreamSpec::mono(SAMPLE_RATE),
            blocks.into_iter().map(Ok).collect(),
        )
    }
}

/// Open/close bookkeeping shared with the test
#[derive(Default)]
pub struct StreamLog {
    pub opens: AtomicUsize,
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
}

impl StreamLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

/// Audio input that plays back a script of streams
///
/// Once the script runs out, every open fails as unavailable.
pub struct ScriptedInput {
    script: Mutex<VecDeque<OpenScript>>,
    log: Arc<StreamLog>,
}

impl ScriptedInput {
    pub fn new(script: Vec<OpenScript>) -> (Self, Arc<StreamLog>) {
        let log = Arc::new(StreamLog::default());
        let input = Self {
            script: Mutex::new(script.into()),
            log: Arc::clone(&log),
        };
        (input, log)
    }
}

impl AudioInput for ScriptedInput {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        self.log.opens.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(OpenScript::Stream(spec, reads)) => {
                let live = self.log.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.log.max_live.fetch_max(live, Ordering::SeqCst);
                Ok(Box::new(ScriptedSource {
                    spec,
                    reads: reads.into(),
                    log: Arc::clone(&self.log),
                }))
            }
            Some(OpenScript::Unavailable) | None => {
                Err(Error::DeviceUnavailable("no scripted device".to_string()))
            }
        }
    }
}

struct ScriptedSource {
    spec: StreamSpec,
    reads: VecDeque<Result<AudioBlock>>,
    log: Arc<StreamLog>,
}

impl FrameSource for ScriptedSource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read_block(&mut self) -> Result<Option<AudioBlock>> {
        self.reads.pop_front().transpose()
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.log.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Detector observations shared with the test
#[derive(Default)]
pub struct DetectorLog {
    pub frames: AtomicUsize,
    pub resets: AtomicUsize,
    pub fired_on: Mutex<Vec<usize>>,
}

/// Detector that fires on the n-th frame after each reset
pub struct NthFrameDetector {
    fire_on: usize,
    seen: usize,
    log: Arc<DetectorLog>,
}

impl NthFrameDetector {
    pub fn new(fire_on: usize) -> (Self, Arc<DetectorLog>) {
        let log = Arc::new(DetectorLog::default());
        let detector = Self {
            fire_on,
            seen: 0,
            log: Arc::clone(&log),
        };
        (detector, log)
    }
}

#[async_trait]
impl WakeDetector for NthFrameDetector {
    async fn process(&mut self, frame: &Frame) -> bool {
        assert_eq!(frame.len(), 512, "frames are always full length");
        self.seen += 1;
        self.log.frames.fetch_add(1, Ordering::SeqCst);
        if self.seen == self.fire_on {
            self.log.fired_on.lock().unwrap().push(self.seen);
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.seen = 0;
        self.log.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transcriber returning a fixed result
pub struct FixedTranscriber {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedTranscriber {
    /// Always returns `text`
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _utterance: &Utterance) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| Error::Stt("scripted failure".to_string()))
    }
}

/// Parser returning a fixed intent and recording what it saw
pub struct FixedParser {
    intent: Option<CommandIntent>,
    pub seen: Mutex<Vec<String>>,
}

impl FixedParser {
    pub fn new(intent: Option<CommandIntent>) -> Arc<Self> {
        Arc::new(Self {
            intent,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl IntentParser for FixedParser {
    async fn parse(&self, text: &str) -> Result<Option<CommandIntent>> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(self.intent.clone())
    }
}

/// Dispatcher that records intents; unknown actions fail like the real one
#[derive(Default)]
pub struct RecordingDispatcher {
    pub dispatched: Mutex<Vec<CommandIntent>>,
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn dispatch(&self, intent: &CommandIntent) -> std::result::Result<String, ActionError> {
        self.dispatched.lock().unwrap().push(intent.clone());
        match intent {
            CommandIntent::Unknown { action } => Err(ActionError::Unsupported(action.clone())),
            _ => Ok("Done.".to_string()),
        }
    }
}

/// Feedback sink that keeps every announcement
#[derive(Default)]
pub struct RecordingFeedback {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingFeedback {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackSink for RecordingFeedback {
    async fn announce(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

/// Handles onto every scripted collaborator of a session
pub struct Harness {
    pub streams: Arc<StreamLog>,
    pub detector: Arc<DetectorLog>,
    pub transcriber: Arc<FixedTranscriber>,
    pub parser: Arc<FixedParser>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub feedback: Arc<RecordingFeedback>,
}

/// Build a session context from scripted parts
pub fn scripted_context(
    script: Vec<OpenScript>,
    fire_on: usize,
    transcriber: Arc<FixedTranscriber>,
    intent: Option<CommandIntent>,
) -> (SessionContext, Harness) {
    let (input, streams) = ScriptedInput::new(script);
    let (detector, detector_log) = NthFrameDetector::new(fire_on);
    let parser = FixedParser::new(intent);
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let feedback = Arc::new(RecordingFeedback::default());

    let context = SessionContext {
        settings: fast_settings(),
        input: Box::new(input),
        detector: Box::new(detector),
        transcriber: Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        parser: Arc::clone(&parser) as Arc<dyn IntentParser>,
        dispatcher: Arc::clone(&dispatcher) as Arc<dyn ActionDispatcher>,
        feedback: Arc::clone(&feedback) as Arc<dyn FeedbackSink>,
    };

    let harness = Harness {
        streams,
        detector: detector_log,
        transcriber,
        parser,
        dispatcher,
        feedback,
    };

    (context, harness)
}
