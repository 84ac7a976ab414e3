//! Genie Tutor - voice conversation loop for spoken English practice
//!
//! This library provides the core conversation cycle:
//! - Persona resolution (free chat vs. guided roleplay scenarios)
//! - Speech capture (microphone + utterance endpointing + remote STT)
//! - Reply generation (remote chat completions with local fallback)
//! - Speech output (remote TTS + local playback)
//! - The session state machine sequencing the three
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Shell (CLI)                      │
//! │   mode/scenario selection  │  triggers  │  notices   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Session Controller                    │
//! │   Idle → Listening → Processing → Speaking → Idle    │
//! └───────┬───────────────────┬────────────────┬────────┘
//!         │                   │                │
//! ┌───────▼──────┐   ┌────────▼───────┐  ┌─────▼───────┐
//! │SpeechCapture │   │ ReplyGenerator │  │SpeechOutput │
//! │ mic+STT      │   │ chat API +     │  │ TTS +       │
//! │              │   │ local fallback │  │ playback    │
//! └──────────────┘   └────────────────┘  └─────────────┘
//! ```

pub mod config;
pub mod error;
pub mod generate;
pub mod persona;
pub mod session;
pub mod voice;

pub use config::{Config, VoiceConfig};
pub use error::{Error, Result};
pub use generate::{RemoteGenerator, Reply, ReplyGenerator, ReplySource};
pub use persona::{Mode, PersonaConfig, Scenario};
pub use session::{
    Notice, Session, SessionCommand, SessionHandle, SessionState, Speaker, Turn,
};
pub use voice::{
    AudioPlayback, CaptureOutcome, MicCapture, PlaybackEnd, SpeakerOutput, SpeechCapture,
    SpeechOutput, SpeechToText, TextToSpeech,
};
