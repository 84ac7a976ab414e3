//! Conversation session controller
//!
//! Owns the turn sequence, the transcript, and the four-state machine that
//! coordinates capture, generation, and playback. The `state` field is the
//! sole synchronization point: no operation starts unless the current state
//! permits it, so at most one of capture/generation/playback is ever active.

use tokio::sync::{mpsc, watch};

use crate::generate::{ReplyGenerator, ReplySource};
use crate::persona::{self, Mode, PersonaConfig, Scenario};
use crate::voice::{CaptureOutcome, SpeechCapture, SpeechOutput};
use crate::Error;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One utterance in the transcript. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    /// A user turn
    #[must_use]
    pub const fn user(text: String) -> Self {
        Self {
            speaker: Speaker::User,
            text,
        }
    }

    /// An assistant turn
    #[must_use]
    pub const fn assistant(text: String) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text,
        }
    }
}

/// Session state. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Ready for the next user turn
    #[default]
    Idle,
    /// Capturing a user utterance
    Listening,
    /// Waiting on reply generation
    Processing,
    /// Playing the assistant reply
    Speaking,
}

/// Commands the shell sends into a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Begin a capture cycle; honored only while Idle
    CaptureStart,
    /// Stop an in-flight capture; honored only while Listening
    CaptureStop,
    /// Cancel the current utterance; honored only while Speaking
    CancelSpeaking,
    /// End the session and return the transcript
    Close,
}

/// Non-fatal notices surfaced to the shell's notification collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The host has no usable speech capture; session stays usable but idle
    CaptureUnavailable,
    /// Capture failed this cycle; the user may retry immediately
    CaptureFailed(String),
    /// Remote generation failed; a canned reply was substituted
    GenerationFailed,
    /// Speaking the reply failed; the turn is kept in the transcript
    PlaybackFailed(String),
}

/// Clonable handle for sending commands into a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Ask the session to begin listening
    pub fn trigger_capture(&self) {
        let _ = self.tx.send(SessionCommand::CaptureStart);
    }

    /// Stop an in-flight capture
    pub fn stop_capture(&self) {
        let _ = self.tx.send(SessionCommand::CaptureStop);
    }

    /// Cancel the utterance currently being spoken
    pub fn cancel_speaking(&self) {
        let _ = self.tx.send(SessionCommand::CancelSpeaking);
    }

    /// End the session
    pub fn close(&self) {
        let _ = self.tx.send(SessionCommand::Close);
    }
}

/// One active conversation: mode, persona, transcript, and state machine.
///
/// Created when a mode is entered and consumed by [`run`](Self::run);
/// re-entering a mode constructs a fresh session with nothing carried over.
pub struct Session {
    mode: Mode,
    scenario: Option<Scenario>,
    persona: PersonaConfig,
    turns: Vec<Turn>,
    state: SessionState,
    capture: Box<dyn SpeechCapture>,
    output: Box<dyn SpeechOutput>,
    generator: Box<dyn ReplyGenerator>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    handle_tx: mpsc::UnboundedSender<SessionCommand>,
    state_tx: watch::Sender<SessionState>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
    close_requested: bool,
}

impl Session {
    /// Create a session for a mode and optional scenario.
    ///
    /// Resolves the persona and appends its greeting as the first assistant
    /// turn. Free mode discards any scenario, keeping the invariant that a
    /// scenario is present iff the mode is roleplay.
    #[must_use]
    pub fn new(
        mode: Mode,
        scenario: Option<Scenario>,
        capture: Box<dyn SpeechCapture>,
        output: Box<dyn SpeechOutput>,
        generator: Box<dyn ReplyGenerator>,
    ) -> Self {
        let scenario = match mode {
            Mode::Free => None,
            Mode::Roleplay => scenario,
        };
        let persona = persona::resolve(mode, scenario);
        let turns = vec![Turn::assistant(persona.greeting.clone())];

        let (handle_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Idle);

        tracing::info!(
            mode = mode.as_str(),
            scenario = scenario.map(Scenario::as_str),
            "session created"
        );

        Self {
            mode,
            scenario,
            persona,
            turns,
            state: SessionState::Idle,
            capture,
            output,
            generator,
            commands,
            handle_tx,
            state_tx,
            notices: None,
            close_requested: false,
        }
    }

    /// Attach a notification surface for non-fatal notices
    #[must_use]
    pub fn with_notices(mut self, notices: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Handle for sending commands from the shell
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.handle_tx.clone(),
        }
    }

    /// Receiver observing state transitions (for status display)
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Conversation mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Roleplay scenario, if any
    #[must_use]
    pub const fn scenario(&self) -> Option<Scenario> {
        self.scenario
    }

    /// Resolved persona for this session
    #[must_use]
    pub const fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    /// Transcript so far, in conversation order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Run the session until closed, returning the final transcript.
    ///
    /// The tutor speaks first: the greeting turn is voiced before commands
    /// are accepted. Each `CaptureStart` then drives one full
    /// `Listening → Processing → Speaking → Idle` cycle; triggers arriving
    /// in any other state are ignored by the guards.
    pub async fn run(mut self) -> Vec<Turn> {
        let greeting = self.turns[0].text.clone();
        self.speak_turn(&greeting).await;

        while !self.close_requested {
            let Some(cmd) = self.commands.recv().await else {
                break;
            };

            match cmd {
                SessionCommand::CaptureStart => self.converse_turn().await,
                SessionCommand::Close => break,
                SessionCommand::CaptureStop | SessionCommand::CancelSpeaking => {
                    tracing::debug!(command = ?cmd, "nothing active, command ignored");
                }
            }
        }

        tracing::info!(turns = self.turns.len(), "session closed");
        self.turns
    }

    /// One full conversation cycle starting from Idle
    async fn converse_turn(&mut self) {
        self.set_state(SessionState::Listening);

        let user_text = match self.listen().await {
            Ok(CaptureOutcome::Transcript(text)) => text,
            Ok(CaptureOutcome::Stopped) => {
                tracing::debug!("capture stopped, no turn appended");
                self.set_state(SessionState::Idle);
                return;
            }
            Err(e) => {
                self.notify(match e {
                    Error::CaptureUnavailable(_) => Notice::CaptureUnavailable,
                    other => Notice::CaptureFailed(other.to_string()),
                });
                self.set_state(SessionState::Idle);
                return;
            }
        };

        self.turns.push(Turn::user(user_text.clone()));
        self.set_state(SessionState::Processing);

        let reply = self.think(&user_text).await;
        if reply.source == ReplySource::Fallback {
            self.notify(Notice::GenerationFailed);
        }
        self.turns.push(Turn::assistant(reply.text.clone()));

        self.speak_turn(&reply.text).await;
    }

    /// Listening: await the capture while draining commands.
    ///
    /// `CaptureStop` forwards to the adapter; a second `CaptureStart` is the
    /// double-trigger case and is ignored.
    async fn listen(&mut self) -> crate::Result<CaptureOutcome> {
        let fut = self.capture.capture();
        tokio::pin!(fut);

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::CaptureStop) => self.capture.stop(),
                    Some(SessionCommand::Close) => {
                        self.close_requested = true;
                        self.capture.stop();
                        return fut.await;
                    }
                    Some(other) => {
                        tracing::debug!(command = ?other, "ignored while listening");
                    }
                    None => {
                        self.close_requested = true;
                        self.capture.stop();
                        return fut.await;
                    }
                },
                outcome = &mut fut => return outcome,
            }
        }
    }

    /// Processing: await generation. The remote call is not cancellable, so
    /// every command except Close is drained and ignored.
    async fn think(&mut self, user_text: &str) -> crate::generate::Reply {
        let history = &self.turns[..self.turns.len() - 1];
        let fut = self.generator.generate(user_text, &self.persona, history);
        tokio::pin!(fut);

        loop {
            tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Close) => {
                        self.close_requested = true;
                        return fut.await;
                    }
                    Some(other) => {
                        tracing::debug!(command = ?other, "ignored while processing");
                    }
                    None => {
                        self.close_requested = true;
                        return fut.await;
                    }
                },
                reply = &mut fut => return reply,
            }
        }
    }

    /// Speaking: voice `text`, honoring cancel, then return to Idle
    async fn speak_turn(&mut self, text: &str) {
        self.set_state(SessionState::Speaking);

        let result = {
            let fut = self.output.speak(text);
            tokio::pin!(fut);

            loop {
                tokio::select! {
                    biased;
                    cmd = self.commands.recv() => match cmd {
                        Some(SessionCommand::CancelSpeaking) => self.output.cancel(),
                        Some(SessionCommand::Close) => {
                            self.close_requested = true;
                            self.output.cancel();
                            break fut.await;
                        }
                        Some(other) => {
                            tracing::debug!(command = ?other, "ignored while speaking");
                        }
                        None => {
                            self.close_requested = true;
                            self.output.cancel();
                            break fut.await;
                        }
                    },
                    result = &mut fut => break result,
                }
            }
        };

        match result {
            Ok(end) => tracing::debug!(end = ?end, "utterance finished"),
            Err(e) => self.notify(Notice::PlaybackFailed(e.to_string())),
        }

        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?state, "state transition");
        self.state = state;
        let _ = self.state_tx.send(state);
    }

    fn notify(&self, notice: Notice) {
        tracing::info!(notice = ?notice, "notice");
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_constructors_tag_the_speaker() {
        assert_eq!(Turn::user("hi".to_string()).speaker, Speaker::User);
        assert_eq!(Turn::assistant("hello".to_string()).speaker, Speaker::Assistant);
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }
}
