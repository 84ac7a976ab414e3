//! Error types for the tutor gateway

use thiserror::Error;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tutor gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The host has no usable speech capture capability
    #[error("speech capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Speech recognition failed during listening (permission, audio, network)
    #[error("capture error: {0}")]
    Capture(String),

    /// Remote reply generation failed
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech playback error
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
