//! Voice processing module
//!
//! Handles audio capture, framing, wake word detection, command recording,
//! STT, TTS, and playback.

mod capture;
mod frame;
mod playback;
mod recorder;
mod stt;
mod tts;
mod wake_word;

pub use capture::{
    AudioBlock, AudioInput, FrameSource, MicrophoneInput, SAMPLE_RATE, StreamSpec,
    input_device_names, next_block,
};
pub use frame::{DEFAULT_FRAME_LENGTH, Frame, FrameAssembler};
pub use playback::{AudioPlayback, decode_mp3, sine_tone};
pub use recorder::{
    DEFAULT_RECORD_DURATION, DEFAULT_SILENCE_THRESHOLD, Recording, Utterance, UtteranceRecorder,
    peak_amplitude, samples_for, samples_to_wav,
};
pub use stt::{SpeechToText, SttProvider, Transcriber};
pub use tts::{TextToSpeech, TtsProvider};
pub use wake_word::{DetectorState, PhraseDetector, SegmenterSettings, WakeDetector, rms_energy};
