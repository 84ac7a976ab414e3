//! Microphone capture adapter
//!
//! Captures one utterance from the default input device, delimits it with
//! the energy endpointer, and transcribes it remotely. cpal streams are not
//! `Send`, so the stream lives on a dedicated thread for the duration of the
//! capture cycle and the async side only touches the shared sample buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tokio::sync::oneshot;

use crate::voice::{CaptureOutcome, SpeechCapture, SpeechToText, UtteranceDetector};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the async side drains the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures single utterances from the default input device
pub struct MicCapture {
    stt: SpeechToText,
    capturing: AtomicBool,
    stop_requested: Arc<AtomicBool>,
}

impl MicCapture {
    /// Create a new microphone capture adapter
    #[must_use]
    pub fn new(stt: SpeechToText) -> Self {
        Self {
            stt,
            capturing: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Releases the capture slot and signals the mic thread on every exit path
struct CycleGuard<'a> {
    capturing: &'a AtomicBool,
    done: Arc<AtomicBool>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechCapture for MicCapture {
    async fn capture(&self) -> Result<CaptureOutcome> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            tracing::debug!("capture already in progress, ignoring");
            return Ok(CaptureOutcome::Stopped);
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(AtomicBool::new(false));
        let _guard = CycleGuard {
            capturing: &self.capturing,
            done: Arc::clone(&done),
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let buffer = Arc::clone(&buffer);
            let stop = Arc::clone(&self.stop_requested);
            let done = Arc::clone(&done);
            std::thread::spawn(move || mic_thread(&buffer, &stop, &done, ready_tx));
        }

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(Error::CaptureUnavailable(
                    "microphone thread failed to start".to_string(),
                ));
            }
        }

        tracing::debug!("listening for utterance");
        let mut detector = UtteranceDetector::new();
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            interval.tick().await;

            if self.stop_requested.load(Ordering::SeqCst) {
                tracing::debug!("capture stopped before transcript");
                return Ok(CaptureOutcome::Stopped);
            }

            let samples = buffer
                .lock()
                .map(|mut buf| std::mem::take(&mut *buf))
                .unwrap_or_default();

            if !samples.is_empty() && detector.push(&samples) {
                break;
            }

            if detector.no_speech_timeout() {
                return Err(Error::Capture("no speech detected".to_string()));
            }
        }

        // Utterance delimited; the guard stops the mic thread while we
        // transcribe.
        done.store(true, Ordering::SeqCst);
        let utterance = detector.take_utterance();
        let wav = samples_to_wav(&utterance, SAMPLE_RATE)?;

        let transcript = self
            .stt
            .transcribe(&wav)
            .await
            .map_err(|e| Error::Capture(e.to_string()))?;

        cycle_outcome(self.stop_requested.load(Ordering::SeqCst), transcript)
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }
}

/// Resolve the end of a capture cycle.
///
/// A stop that raced the transcription round trip wins over the transcript:
/// stop is immediate from the caller's point of view, so a transcript
/// delivered after it must not surface as a completed capture.
fn cycle_outcome(stop_requested: bool, transcript: String) -> Result<CaptureOutcome> {
    if stop_requested {
        tracing::debug!("capture stopped during transcription");
        return Ok(CaptureOutcome::Stopped);
    }

    if transcript.trim().is_empty() {
        return Err(Error::Capture("empty transcript".to_string()));
    }

    Ok(CaptureOutcome::Transcript(transcript))
}

/// Owns the cpal input stream until the cycle ends
fn mic_thread(
    buffer: &Arc<Mutex<Vec<f32>>>,
    stop: &Arc<AtomicBool>,
    done: &Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let stream = match build_input_stream(buffer) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::CaptureUnavailable(e.to_string())));
        return;
    }

    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    while !stop.load(Ordering::SeqCst) && !done.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    tracing::debug!("microphone released");
}

/// Open the default input device at the capture sample rate
fn build_input_stream(buffer: &Arc<Mutex<Vec<f32>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::CaptureUnavailable("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::CaptureUnavailable(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| {
            Error::CaptureUnavailable("no suitable input config found".to_string())
        })?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "microphone opened"
    );

    let buffer = Arc::clone(buffer);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::CaptureUnavailable(e.to_string()))?;

    Ok(stream)
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_during_transcription_wins_over_the_transcript() {
        let outcome = cycle_outcome(true, "hello there".to_string()).unwrap();
        assert_eq!(outcome, CaptureOutcome::Stopped);
    }

    #[test]
    fn transcript_resolves_when_not_stopped() {
        let outcome = cycle_outcome(false, "hello there".to_string()).unwrap();
        assert_eq!(outcome, CaptureOutcome::Transcript("hello there".to_string()));
    }

    #[test]
    fn empty_transcript_is_a_capture_error() {
        assert!(cycle_outcome(false, "  ".to_string()).is_err());
    }

    #[test]
    fn wav_encoding_produces_valid_header() {
        let samples = vec![0.0f32; 1600];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 16-bit mono: header + 2 bytes per sample
        assert!(wav.len() >= 44 + samples.len() * 2);
    }
}
