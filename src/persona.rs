//! Persona resolution
//!
//! Maps a conversation mode (and scenario, for roleplay) to the instruction
//! text, greeting line, and reply-length hint that frame the remote model.
//! Resolution is a pure lookup so a session can recompute it at any time.

use serde::{Deserialize, Serialize};

/// Conversation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Open-ended tutoring chat
    Free,
    /// Guided roleplay in a fixed scenario
    Roleplay,
}

impl Mode {
    /// Short identifier used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Roleplay => "roleplay",
        }
    }
}

/// Roleplay scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    School,
    Store,
    Home,
}

impl Scenario {
    /// Short identifier used in logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Store => "store",
            Self::Home => "home",
        }
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "school" => Ok(Self::School),
            "store" => Ok(Self::Store),
            "home" => Ok(Self::Home),
            other => Err(format!("unknown scenario: {other}")),
        }
    }
}

/// Instruction/greeting pair framing the remote model for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaConfig {
    /// System instruction sent with every generation request
    pub instruction: String,

    /// First assistant turn, spoken when the session opens
    pub greeting: String,

    /// Request-time hint for reply length (not enforced locally)
    pub max_reply_words: usize,
}

/// Reply-length hint for free chat (room for explanation)
const FREE_MAX_REPLY_WORDS: usize = 60;

/// Reply-length hint for roleplay (tight, natural turns)
const ROLEPLAY_MAX_REPLY_WORDS: usize = 25;

/// Resolve the persona for a mode and optional scenario.
///
/// Pure and total: free mode ignores the scenario, and roleplay without a
/// scenario resolves a generic practice persona instead of failing, so a bad
/// selection upstream never dead-ends the conversation.
#[must_use]
pub fn resolve(mode: Mode, scenario: Option<Scenario>) -> PersonaConfig {
    match mode {
        Mode::Free => PersonaConfig {
            instruction: "You are Genie, a friendly English tutor for children. \
                          Answer questions patiently, encourage the student, and \
                          gently correct mistakes."
                .to_string(),
            greeting: "Hello! I'm Genie, your English tutor. What would you like \
                       to learn today?"
                .to_string(),
            max_reply_words: FREE_MAX_REPLY_WORDS,
        },
        Mode::Roleplay => match scenario {
            Some(Scenario::School) => PersonaConfig {
                instruction: "You are a friendly teacher at a school. Stay in \
                              character and keep the conversation about school \
                              life, subjects, and friends."
                    .to_string(),
                greeting: "Good morning! Welcome to school! What's your name?".to_string(),
                max_reply_words: ROLEPLAY_MAX_REPLY_WORDS,
            },
            Some(Scenario::Store) => PersonaConfig {
                instruction: "You are a cheerful shopkeeper. Stay in character \
                              and help the customer practice shopping vocabulary \
                              and polite requests."
                    .to_string(),
                greeting: "Welcome to our store! What would you like to buy today?".to_string(),
                max_reply_words: ROLEPLAY_MAX_REPLY_WORDS,
            },
            Some(Scenario::Home) => PersonaConfig {
                instruction: "You are a kind family friend visiting at home. Stay \
                              in character and talk about family, home activities, \
                              and daily routines."
                    .to_string(),
                greeting: "Hi there! Tell me about your family. Who do you live with?".to_string(),
                max_reply_words: ROLEPLAY_MAX_REPLY_WORDS,
            },
            None => PersonaConfig {
                instruction: "You are a friendly conversation partner helping a \
                              child practice speaking English."
                    .to_string(),
                greeting: "Hello! Let's practice speaking together!".to_string(),
                max_reply_words: ROLEPLAY_MAX_REPLY_WORDS,
            },
        },
    }
}

/// Canned replies used when remote generation fails.
///
/// Always non-empty for every mode/scenario combination; the generator picks
/// one at random so a network outage degrades to a generic encouraging
/// continuation rather than a stalled turn.
#[must_use]
pub fn fallback_replies(mode: Mode, scenario: Option<Scenario>) -> &'static [&'static str] {
    match mode {
        Mode::Free => &[
            "That's a great question! Let me help you with that.",
            "I understand. Can you tell me more about that?",
            "Excellent! You're doing really well. What else would you like to know?",
            "That's interesting! Can you give me an example?",
        ],
        Mode::Roleplay => match scenario {
            Some(Scenario::School) => &[
                "Nice to meet you! Do you like school?",
                "That's wonderful! What's your favorite subject?",
                "Great! Do you have many friends at school?",
            ],
            Some(Scenario::Store) => &[
                "That's a good choice! How many would you like?",
                "Perfect! That costs $2. Do you have money?",
                "Thank you for shopping with us! Have a great day!",
            ],
            Some(Scenario::Home) => &[
                "That sounds lovely! Do you help your family at home?",
                "What a nice family! What do you like to do together?",
                "That's wonderful! You're very helpful!",
            ],
            None => &["That's great! Keep practicing!"],
        },
    }
}
