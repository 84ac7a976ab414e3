//! Shared test utilities: scripted adapters for driving a session
//! without audio hardware or network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use genie_tutor::{
    CaptureOutcome, Error, PersonaConfig, PlaybackEnd, Reply, ReplyGenerator, ReplySource,
    SpeechCapture, SpeechOutput, Turn,
};
use tokio::sync::Notify;

/// One scripted capture cycle
pub enum CaptureStep {
    /// Resolve immediately with a transcript
    Transcript(&'static str),
    /// Fail immediately
    Fail(&'static str),
    /// Fail immediately as if no input device exists
    Unavailable,
    /// Pend until `stop()` is called, then resolve `Stopped`
    WaitForStop,
}

/// Capture adapter that replays a script instead of recording audio
pub struct ScriptedCapture {
    script: Mutex<VecDeque<CaptureStep>>,
    stop: Notify,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCapture {
    pub fn new(script: Vec<CaptureStep>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            stop: Notify::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `capture()` invocations
    pub fn call_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SpeechCapture for ScriptedCapture {
    async fn capture(&self) -> genie_tutor::Result<CaptureOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(CaptureStep::Transcript(text)) => Ok(CaptureOutcome::Transcript(text.to_string())),
            Some(CaptureStep::Fail(msg)) => Err(Error::Capture(msg.to_string())),
            Some(CaptureStep::Unavailable) => {
                Err(Error::CaptureUnavailable("no input device".to_string()))
            }
            Some(CaptureStep::WaitForStop) => {
                self.stop.notified().await;
                Ok(CaptureOutcome::Stopped)
            }
            None => Ok(CaptureOutcome::Stopped),
        }
    }

    fn stop(&self) {
        self.stop.notify_one();
    }
}

/// Generator that replays scripted replies and records what it was asked
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    requests: Arc<Mutex<Vec<GeneratorRequest>>>,
}

/// What the session handed the generator on one call
#[derive(Debug, Clone)]
pub struct GeneratorRequest {
    pub user_text: String,
    pub instruction: String,
    pub history: Vec<Turn>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn remote(text: &str) -> Reply {
        Reply {
            text: text.to_string(),
            source: ReplySource::Remote,
        }
    }

    pub fn fallback(text: &str) -> Reply {
        Reply {
            text: text.to_string(),
            source: ReplySource::Fallback,
        }
    }

    /// Shared log of generation requests
    pub fn requests(&self) -> Arc<Mutex<Vec<GeneratorRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, user_text: &str, persona: &PersonaConfig, history: &[Turn]) -> Reply {
        self.requests.lock().unwrap().push(GeneratorRequest {
            user_text: user_text.to_string(),
            instruction: persona.instruction.clone(),
            history: history.to_vec(),
        });

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedGenerator::fallback("canned"))
    }
}

/// One scripted playback
pub enum OutputStep {
    /// Resolve immediately as completed
    Complete,
    /// Pend until `cancel()` is called, then resolve interrupted
    WaitForCancel,
    /// Fail immediately
    Fail(&'static str),
}

/// Output adapter that records spoken text instead of playing audio
pub struct ScriptedOutput {
    script: Mutex<VecDeque<OutputStep>>,
    spoken: Arc<Mutex<Vec<String>>>,
    cancel: Notify,
}

impl ScriptedOutput {
    pub fn new(script: Vec<OutputStep>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            spoken: Arc::new(Mutex::new(Vec::new())),
            cancel: Notify::new(),
        }
    }

    /// Shared log of texts handed to `speak()`
    pub fn spoken(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

#[async_trait]
impl SpeechOutput for ScriptedOutput {
    async fn speak(&self, text: &str) -> genie_tutor::Result<PlaybackEnd> {
        self.spoken.lock().unwrap().push(text.to_string());
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(OutputStep::WaitForCancel) => {
                self.cancel.notified().await;
                Ok(PlaybackEnd::Interrupted)
            }
            Some(OutputStep::Fail(msg)) => Err(Error::Playback(msg.to_string())),
            Some(OutputStep::Complete) | None => Ok(PlaybackEnd::Completed),
        }
    }

    fn cancel(&self) {
        self.cancel.notify_one();
    }
}
