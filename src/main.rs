use std::io::BufRead;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use genie_tutor::{
    AudioPlayback, CaptureOutcome, Config, MicCapture, Mode, RemoteGenerator, Scenario, Session,
    SessionState, SpeakerOutput, Speaker, SpeechCapture, SpeechOutput, SpeechToText, TextToSpeech,
};

/// Genie - voice conversation tutor for spoken English practice
#[derive(Parser)]
#[command(name = "genie", version, about)]
struct Cli {
    /// Conversation mode: "free" or "roleplay"
    #[arg(short, long, env = "GENIE_MODE", default_value = "free")]
    mode: String,

    /// Roleplay scenario: "school", "store", or "home"
    #[arg(short, long, env = "GENIE_SCENARIO")]
    scenario: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone capture: record one utterance, print the transcript
    TestMic,
    /// Test speaker output with a short tone
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,genie_tutor=info",
        1 => "info,genie_tutor=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic => test_mic().await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let mode = parse_mode(&cli.mode)?;
    let scenario = cli
        .scenario
        .as_deref()
        .map(|s| s.parse::<Scenario>().map_err(anyhow::Error::msg))
        .transpose()?;

    tracing::info!(mode = mode.as_str(), scenario = ?cli.scenario, "starting genie");

    let config = Config::from_env()?;
    let session = build_session(&config, mode, scenario);

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let session = session.with_notices(notice_tx);
    let handle = session.handle();
    let mut state_rx = session.watch_state();
    let input_state_rx = session.watch_state();

    // Status display
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            match *state_rx.borrow() {
                SessionState::Listening => println!("  [listening...]"),
                SessionState::Processing => println!("  [thinking...]"),
                SessionState::Speaking => println!("  [speaking...]"),
                SessionState::Idle => println!("  [ready - press Enter to talk, q to quit]"),
            }
        }
    });

    // Notification surface
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            eprintln!("  note: {notice:?}");
        }
    });

    // Keyboard input: Enter talks (or cancels the tutor mid-sentence),
    // "s" stops listening, "q" ends the session.
    let input_handle = handle.clone();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "q" => {
                    input_handle.close();
                    break;
                }
                "s" => input_handle.stop_capture(),
                _ => {
                    if *input_state_rx.borrow() == SessionState::Speaking {
                        input_handle.cancel_speaking();
                    } else {
                        input_handle.trigger_capture();
                    }
                }
            }
        }
    });

    println!("Genie is ready. Press Enter to talk, q to quit.\n");
    let transcript = session.run().await;

    println!("\n--- transcript ---");
    for turn in &transcript {
        let who = match turn.speaker {
            Speaker::User => "you",
            Speaker::Assistant => "genie",
        };
        println!("{who}: {}", turn.text);
    }

    Ok(())
}

fn parse_mode(mode: &str) -> anyhow::Result<Mode> {
    match mode.to_lowercase().as_str() {
        "free" | "chat" => Ok(Mode::Free),
        "roleplay" => Ok(Mode::Roleplay),
        other => anyhow::bail!("unknown mode: {other} (expected \"free\" or \"roleplay\")"),
    }
}

fn build_session(config: &Config, mode: Mode, scenario: Option<Scenario>) -> Session {
    let stt = SpeechToText::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.voice.stt_model.clone(),
        config.voice.language.clone(),
    );
    let tts = TextToSpeech::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    );
    let generator = RemoteGenerator::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.chat_model.clone(),
        mode,
        scenario,
    );

    // Playback failures degrade at speak time; constructing the adapter
    // up front keeps session creation infallible.
    let output: Box<dyn SpeechOutput> = match AudioPlayback::new() {
        Ok(playback) => Box::new(SpeakerOutput::new(tts, playback)),
        Err(e) => {
            tracing::warn!(error = %e, "no audio output, replies will not be voiced");
            Box::new(SilentOutput)
        }
    };

    Session::new(
        mode,
        scenario,
        Box::new(MicCapture::new(stt)),
        output,
        Box::new(generator),
    )
}

/// Output adapter used when the host has no audio output device
struct SilentOutput;

#[async_trait::async_trait]
impl SpeechOutput for SilentOutput {
    async fn speak(&self, text: &str) -> genie_tutor::Result<genie_tutor::PlaybackEnd> {
        println!("genie: {text}");
        Ok(genie_tutor::PlaybackEnd::Completed)
    }

    fn cancel(&self) {}
}

async fn test_mic() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let stt = SpeechToText::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.voice.stt_model.clone(),
        config.voice.language.clone(),
    );
    let capture = MicCapture::new(stt);

    println!("Speak now...");
    match capture.capture().await? {
        CaptureOutcome::Transcript(text) => println!("Heard: {text}"),
        CaptureOutcome::Stopped => println!("Capture stopped."),
    }
    Ok(())
}

fn test_speaker() -> anyhow::Result<()> {
    println!("Playing test tone...");

    let playback = AudioPlayback::new()?;
    let samples: Vec<f32> = (0..24000)
        .map(|i| {
            let t = i as f32 / 24000.0;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect();

    playback.play_blocking(samples)?;
    println!("Done.");
    Ok(())
}

async fn test_tts(text: &str) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let tts = TextToSpeech::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    );
    let playback = AudioPlayback::new()?;
    let output = SpeakerOutput::new(tts, playback);

    println!("Speaking: {text}");
    output.speak(text).await?;
    println!("Done.");
    Ok(())
}
