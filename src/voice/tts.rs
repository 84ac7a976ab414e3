//! Text-to-speech (TTS) processing

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Synthesizes speech from text via a hosted TTS endpoint
pub struct TextToSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    voice: String,
    speed: f64,
}

impl TextToSpeech {
    /// Create a new TTS client
    #[must_use]
    pub fn new(
        api_base: String,
        api_key: SecretString,
        model: String,
        voice: String,
        speed: f64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            model,
            voice,
            speed,
        }
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
