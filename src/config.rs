//! Configuration for the tutor gateway

use secrecy::SecretString;

use crate::{Error, Result};

/// Default chat-completions API base
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Tutor gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API credential for the remote speech and generation endpoints.
    /// Injected from the environment; never embedded or logged.
    pub api_key: SecretString,

    /// Base URL for the OpenAI-compatible API
    pub api_base: String,

    /// Chat model identifier for reply generation
    pub chat_model: String,

    /// Voice configuration
    pub voice: VoiceConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Capture language (ISO 639-1)
    pub language: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 0.9,
            language: "en".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `GENIE_*` environment variables.
    ///
    /// Only the API key is required; everything else has a default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `GENIE_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GENIE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("GENIE_API_KEY is required".to_string()))?;

        let voice = VoiceConfig {
            stt_model: env_or("GENIE_STT_MODEL", "whisper-1"),
            tts_model: env_or("GENIE_TTS_MODEL", "tts-1"),
            tts_voice: env_or("GENIE_TTS_VOICE", "nova"),
            tts_speed: std::env::var("GENIE_TTS_SPEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.9),
            language: env_or("GENIE_LANGUAGE", "en"),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: env_or("GENIE_API_BASE", DEFAULT_API_BASE),
            chat_model: env_or("GENIE_CHAT_MODEL", "gpt-4o-mini"),
            voice,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_defaults_are_sane() {
        let v = VoiceConfig::default();
        assert_eq!(v.stt_model, "whisper-1");
        assert!(v.tts_speed > 0.0 && v.tts_speed <= 4.0);
    }
}
