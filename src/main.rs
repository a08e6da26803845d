use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use friday::voice::{
    AudioBlock, AudioInput, AudioPlayback, FrameSource, MicrophoneInput, PhraseDetector,
    SpeechToText, TextToSpeech, Transcriber, input_device_names, peak_amplitude, rms_energy,
    sine_tone,
};
use friday::{
    ChatIntentParser, CommandDispatcher, Config, FeedbackSink, IntentParser, LogFeedback,
    SessionContext, SessionLoop, SessionSettings, SpokenFeedback,
};

/// Friday - wake-word voice command assistant
#[derive(Parser)]
#[command(name = "friday", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.config/friday/config.toml)
    #[arg(short, long, env = "FRIDAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log feedback instead of speaking it
    #[arg(long)]
    mute: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Listen for the wake phrase and run commands (default)
    Run,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output with a tone
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! I am Friday. How can I help?")]
        text: String,
    },
    /// Parse a command and print the intent as JSON
    Parse {
        /// Command text, e.g. "play lazy lamhe playlist"
        text: String,
    },
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,friday=info",
        1 => "info,friday=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Devices) => return list_devices(),
        Some(Command::TestSpeaker) => return test_speaker(),
        _ => {}
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_session(&config, cli.mute).await,
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
        Command::Parse { text } => parse_command(&config, &text).await,
        Command::Devices | Command::TestSpeaker => Ok(()),
    }
}

/// Wire the default collaborators and run the session until Ctrl+C
#[allow(clippy::future_not_send)]
async fn run_session(config: &Config, mute: bool) -> anyhow::Result<()> {
    let transcriber: Arc<dyn Transcriber> =
        Arc::new(SpeechToText::from_config(&config.stt, &config.api_keys)?);

    let detector = PhraseDetector::new(
        config.wake.phrases.clone(),
        Arc::clone(&transcriber),
        config.wake.segmenter(config.audio.sample_rate),
    );

    let parser = ChatIntentParser::from_config(&config.intent, &config.api_keys)?;
    let dispatcher = CommandDispatcher::from_config(config)?;

    let context = SessionContext {
        settings: SessionSettings::from(config),
        input: Box::new(MicrophoneInput::new(
            config.audio.sample_rate,
            config.audio.ring_capacity,
        )),
        detector: Box::new(detector),
        transcriber,
        parser: Arc::new(parser),
        dispatcher: Arc::new(dispatcher),
        feedback: feedback_sink(config, mute),
    };

    let mut session = SessionLoop::new(context)?;

    let stop = session.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            stop.cancel();
        }
    });

    tracing::info!(wake_phrases = ?config.wake.phrases, "friday is ready");
    session.run().await?;

    let stats = session.stats();
    tracing::info!(
        cycles = stats.cycles,
        completed = stats.actions_completed,
        failed = stats.actions_failed,
        "session finished"
    );
    Ok(())
}

fn feedback_sink(config: &Config, mute: bool) -> Arc<dyn FeedbackSink> {
    if mute || !config.tts.enabled {
        return Arc::new(LogFeedback);
    }

    match SpokenFeedback::from_config(config) {
        Ok(spoken) => Arc::new(spoken),
        Err(e) => {
            tracing::warn!(error = %e, "spoken feedback unavailable, logging instead");
            Arc::new(LogFeedback)
        }
    }
}

/// Print a level meter for the default microphone, once per second
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, seconds: u64) -> anyhow::Result<()> {
    let input = MicrophoneInput::new(config.audio.sample_rate, config.audio.ring_capacity);
    let mut source = input.open()?;

    let spec = source.spec();
    println!(
        "Capturing {}ch at {} Hz for {seconds}s, say something.",
        spec.channels, spec.sample_rate
    );

    for second in 1..=seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = source
            .read_block()?
            .map(AudioBlock::into_samples)
            .unwrap_or_default();
        let level = rms_energy(&samples);
        let peak = peak_amplitude(&samples);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bars = (level * 100.0).clamp(0.0, 40.0) as usize;
        println!(
            "{second:>3}s  rms {level:.4}  peak {peak:.4}  |{:<40}|",
            "#".repeat(bars)
        );
    }
    drop(source);

    println!(
        "\nRecordings peaking under {:.2} count as silence.",
        config.recorder.silence_threshold
    );
    println!("A flat meter usually means the wrong default input; see `friday devices`.");
    Ok(())
}

/// Play a 440Hz tone through the feedback output path
fn test_speaker() -> anyhow::Result<()> {
    let playback = AudioPlayback::new()?;
    let tone = sine_tone(440.0, Duration::from_secs(2), 0.3);

    println!("Playing a 2s 440Hz tone ({} samples).", tone.len());
    playback.play_samples(tone)?;
    println!("Silence here means the default output sink is wrong or muted.");
    Ok(())
}

/// Synthesize `text` with the configured provider and play it
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let tts = TextToSpeech::from_config(&config.tts, &config.api_keys)?;

    let mp3 = tts.synthesize(text).await?;
    println!(
        "{:?} returned {} bytes for \"{text}\"",
        config.tts.provider,
        mp3.len()
    );

    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&mp3)).await??;
    Ok(())
}

/// Parse a typed command and print the intent
async fn parse_command(config: &Config, text: &str) -> anyhow::Result<()> {
    let parser = ChatIntentParser::from_config(&config.intent, &config.api_keys)?;

    match parser.parse(text).await? {
        Some(intent) => println!("{}", serde_json::to_string_pretty(&intent)?),
        None => println!("No command understood."),
    }

    Ok(())
}

/// List input devices
fn list_devices() -> anyhow::Result<()> {
    let names = input_device_names()?;
    if names.is_empty() {
        println!("No input devices found.");
        return Ok(());
    }

    println!("Input devices:");
    for name in names {
        println!("  {name}");
    }
    Ok(())
}
