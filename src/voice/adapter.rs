//! Speech adapter contracts
//!
//! The session controller owns one implementation of each trait per session.
//! Methods take `&self` so `stop`/`cancel` can interrupt an awaited
//! `capture`/`speak` on the same adapter; implementations use interior
//! mutability for the small amount of shared state this requires.

use async_trait::async_trait;

use crate::Result;

/// How one capture cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A finalized transcript of the captured utterance
    Transcript(String),
    /// Capture was stopped before a transcript was produced
    Stopped,
}

/// How one spoken utterance ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The utterance played to the end
    Completed,
    /// A cancel or a newer utterance superseded this one
    Interrupted,
}

/// Single-utterance speech-to-text capture.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Capture one utterance and resolve with its transcript.
    ///
    /// Exactly one outcome per call: a transcript, [`CaptureOutcome::Stopped`]
    /// after a manual [`stop`](Self::stop), or an error
    /// ([`Error::CaptureUnavailable`](crate::Error::CaptureUnavailable) when
    /// the host lacks the capability, [`Error::Capture`](crate::Error::Capture)
    /// for recognition failures). A call issued while a capture is already in
    /// flight is a no-op that resolves `Stopped` without touching the
    /// microphone.
    async fn capture(&self) -> Result<CaptureOutcome>;

    /// Abort an in-flight capture immediately.
    ///
    /// Local and non-blocking; the pending `capture` resolves
    /// [`CaptureOutcome::Stopped`]. A no-op when nothing is capturing.
    fn stop(&self);
}

/// Text-to-speech output with at-most-one-utterance-active semantics.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, superseding any utterance still playing.
    ///
    /// Resolves [`PlaybackEnd::Completed`] when the utterance plays to the
    /// end, or [`PlaybackEnd::Interrupted`] when a later `speak` or a
    /// [`cancel`](Self::cancel) took over. Each call resolves exactly once;
    /// a superseded utterance never reports `Completed`.
    async fn speak(&self, text: &str) -> Result<PlaybackEnd>;

    /// Stop the current utterance immediately. Local and non-blocking.
    fn cancel(&self);
}
