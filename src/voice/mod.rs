//! Voice processing module
//!
//! Speech capture and playback adapters behind injectable traits, so the
//! session controller can run against test doubles without audio hardware.

mod adapter;
mod capture;
mod endpoint;
mod playback;
mod stt;
mod tts;

pub use adapter::{CaptureOutcome, PlaybackEnd, SpeechCapture, SpeechOutput};
pub use capture::{MicCapture, SAMPLE_RATE, samples_to_wav};
pub use endpoint::{EndpointState, UtteranceDetector};
pub use playback::{AudioPlayback, SpeakerOutput};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
