//! Reply generation
//!
//! Sends the transcript and persona framing to a remote chat-completions
//! endpoint. Failure of any kind degrades to a canned per-persona reply so a
//! network problem never stalls the conversation mid-turn.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use secrecy::{ExposeSecret, SecretString};

use crate::persona::{self, Mode, PersonaConfig, Scenario};
use crate::session::{Speaker, Turn};

/// Upper bound on completion size; the word limit in the instruction is the
/// real length hint
const MAX_TOKENS: u32 = 256;

/// Prior turns sent as context with each request
const MAX_HISTORY_TURNS: usize = 20;

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// Generated by the remote model
    Remote,
    /// Local canned fallback after a generation failure
    Fallback,
}

/// One generated assistant reply
#[derive(Debug, Clone)]
pub struct Reply {
    /// Reply text, never empty
    pub text: String,
    /// Whether generation succeeded or fell back
    pub source: ReplySource,
}

/// Produces assistant replies for user turns.
///
/// Implementations never fail and never return an empty string; the remote
/// generator satisfies this with its fallback policy. At most one generation
/// is in flight per session, enforced by the session controller awaiting each
/// call.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply to `user_text` given the persona and prior turns
    async fn generate(&self, user_text: &str, persona: &PersonaConfig, history: &[Turn]) -> Reply;
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, PartialEq, Eq, serde::Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Remote chat-completions generator with local fallback
pub struct RemoteGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    fallbacks: &'static [&'static str],
}

impl RemoteGenerator {
    /// Create a generator for one session's mode and scenario.
    ///
    /// The credential is injected and used only in the request header; it is
    /// never logged.
    #[must_use]
    pub fn new(
        api_base: String,
        api_key: SecretString,
        model: String,
        mode: Mode,
        scenario: Option<Scenario>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            api_key,
            model,
            fallbacks: persona::fallback_replies(mode, scenario),
        }
    }

    /// Pick a random canned reply for this session's persona
    fn fallback(&self) -> Reply {
        let text = self
            .fallbacks
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("That's great! Keep practicing!")
            .to_string();

        Reply {
            text,
            source: ReplySource::Fallback,
        }
    }

    /// One request/response round trip; any error here triggers the fallback
    async fn request_reply(
        &self,
        user_text: &str,
        persona: &PersonaConfig,
        history: &[Turn],
    ) -> crate::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: build_messages(user_text, persona, history),
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::Generation(format!(
                "chat API error {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if text.is_empty() {
            return Err(crate::Error::Generation("empty completion".to_string()));
        }

        Ok(text)
    }
}

#[async_trait]
impl ReplyGenerator for RemoteGenerator {
    async fn generate(&self, user_text: &str, persona: &PersonaConfig, history: &[Turn]) -> Reply {
        match self.request_reply(user_text, persona, history).await {
            Ok(text) => {
                tracing::debug!(reply_len = text.len(), "generation complete");
                Reply {
                    text,
                    source: ReplySource::Remote,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed, using fallback reply");
                self.fallback()
            }
        }
    }
}

/// Assemble the chat messages: persona instruction with the length hint,
/// recent history as role-tagged turns, then the latest user text.
fn build_messages(user_text: &str, persona: &PersonaConfig, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len().min(MAX_HISTORY_TURNS) + 2);

    messages.push(ChatMessage {
        role: "system",
        content: format!(
            "{} Reply in at most {} words.",
            persona.instruction, persona.max_reply_words
        ),
    });

    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    for turn in &history[skip..] {
        messages.push(ChatMessage {
            role: match turn.speaker {
                Speaker::User => "user",
                Speaker::Assistant => "assistant",
            },
            content: turn.text.clone(),
        });
    }

    messages.push(ChatMessage {
        role: "user",
        content: user_text.to_string(),
    });

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::resolve;

    #[test]
    fn messages_start_with_instruction_and_end_with_user_text() {
        let persona = resolve(Mode::Roleplay, Some(Scenario::Store));
        let history = vec![
            Turn::assistant(persona.greeting.clone()),
            Turn::user("I want apples".to_string()),
        ];

        let messages = build_messages("Three please", &persona, &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("shopkeeper"));
        assert!(messages[0].content.contains("25 words"));
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages.last().unwrap().content, "Three please");
    }

    #[test]
    fn history_is_clipped_to_recent_turns() {
        let persona = resolve(Mode::Free, None);
        let history: Vec<Turn> = (0..50)
            .map(|i| Turn::user(format!("turn {i}")))
            .collect();

        let messages = build_messages("latest", &persona, &history);

        // system + clipped history + latest user text
        assert_eq!(messages.len(), MAX_HISTORY_TURNS + 2);
        assert_eq!(messages[1].content, "turn 30");
    }

    #[test]
    fn fallback_reply_is_from_the_persona_table() {
        let generator = RemoteGenerator::new(
            "http://localhost:9".to_string(),
            SecretString::from("test-key"),
            "test-model".to_string(),
            Mode::Roleplay,
            Some(Scenario::School),
        );

        let expected = persona::fallback_replies(Mode::Roleplay, Some(Scenario::School));
        for _ in 0..16 {
            let reply = generator.fallback();
            assert_eq!(reply.source, ReplySource::Fallback);
            assert!(expected.contains(&reply.text.as_str()));
        }
    }
}
