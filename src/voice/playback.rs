//! Audio playback and the speaker output adapter

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::voice::{PlaybackEnd, SpeechOutput, TextToSpeech};
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Tracks which utterance is current.
///
/// Each `speak` takes a ticket via [`begin`](Self::begin), superseding
/// whatever holds the previous one; a cancel bumps the counter without
/// taking a ticket. An utterance keeps playing only while its ticket is
/// current, which gives the at-most-one-utterance-active invariant: the
/// superseded utterance resolves `Interrupted` and only the latest one can
/// resolve `Completed`.
#[derive(Clone, Default)]
struct UtteranceCounter {
    inner: Arc<AtomicU64>,
}

impl UtteranceCounter {
    /// Take the ticket for a new utterance, superseding the previous one
    fn begin(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Invalidate the current ticket without taking a new one
    fn supersede(&self) {
        self.inner.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.inner.load(Ordering::SeqCst) == ticket
    }

    /// End-state for a playing utterance: `Interrupted` as soon as the
    /// ticket is stale, `Completed` only for a current, finished one,
    /// `None` while it should keep playing.
    fn end_for(&self, ticket: u64, finished: bool) -> Option<PlaybackEnd> {
        if !self.is_current(ticket) {
            Some(PlaybackEnd::Interrupted)
        } else if finished {
            Some(PlaybackEnd::Completed)
        } else {
            None
        }
    }
}

/// Plays audio to the default output device
#[derive(Clone)]
pub struct AudioPlayback {
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device or suitable config is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }

    /// Play samples to the end, blocking the current thread
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub fn play_blocking(&self, samples: Vec<f32>) -> Result<()> {
        let counter = UtteranceCounter::default();
        let ticket = counter.begin();
        self.play_until(samples, &counter, ticket)?;
        Ok(())
    }

    /// Play samples until the end or until `ticket` is superseded.
    ///
    /// Blocking; callers run this on a blocking task. Bumping the counter is
    /// how a newer utterance or a cancel interrupts playback.
    fn play_until(
        &self,
        samples: Vec<f32>,
        counter: &UtteranceCounter,
        ticket: u64,
    ) -> Result<PlaybackEnd> {
        if samples.is_empty() {
            return Ok(PlaybackEnd::Completed);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = self.config.clone();
        let channels = config.channels as usize;
        let sample_count = samples.len();

        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(AtomicBool::new(false));

        let samples = Arc::new(samples);
        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = position_cb.lock() else {
                        return;
                    };

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples_cb.len() {
                            samples_cb[*pos]
                        } else {
                            finished_cb.store(true, Ordering::SeqCst);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if *pos < samples_cb.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion with a timeout slightly past the audio length
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        let end = loop {
            let done = finished.load(Ordering::SeqCst) || start.elapsed() > timeout;
            if let Some(end) = counter.end_for(ticket, done) {
                break end;
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        if end == PlaybackEnd::Completed {
            // Small delay so the tail is not clipped
            std::thread::sleep(Duration::from_millis(100));
        }

        drop(stream);
        tracing::debug!(samples = sample_count, end = ?end, "playback finished");
        Ok(end)
    }
}

/// Speaks replies through TTS synthesis and the local output device.
///
/// At most one utterance is active; a new `speak` or a `cancel` bumps the
/// utterance counter, which interrupts whatever is currently playing.
pub struct SpeakerOutput {
    tts: TextToSpeech,
    playback: AudioPlayback,
    counter: UtteranceCounter,
}

impl SpeakerOutput {
    /// Create a speaker output adapter
    #[must_use]
    pub fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self {
            tts,
            playback,
            counter: UtteranceCounter::default(),
        }
    }
}

#[async_trait]
impl SpeechOutput for SpeakerOutput {
    async fn speak(&self, text: &str) -> Result<PlaybackEnd> {
        // Taking a new ticket supersedes any utterance in flight
        let ticket = self.counter.begin();

        tracing::debug!(text, "speaking");
        let audio = self.tts.synthesize(text).await?;
        let samples = decode_mp3(&audio)?;

        // A newer speak or a cancel may have arrived during synthesis
        if !self.counter.is_current(ticket) {
            return Ok(PlaybackEnd::Interrupted);
        }

        let playback = self.playback.clone();
        let counter = self.counter.clone();
        let end = tokio::task::spawn_blocking(move || {
            playback.play_until(samples, &counter, ticket)
        })
        .await
        .map_err(|e| Error::Playback(e.to_string()))??;

        Ok(end)
    }

    fn cancel(&self) {
        self.counter.supersede();
    }
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and mix stereo down to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_second_utterance_supersedes_the_first() {
        let counter = UtteranceCounter::default();
        let first = counter.begin();
        assert!(counter.is_current(first));

        // a second speak arrives while the first is still playing: the first
        // resolves Interrupted and only the latest can resolve Completed
        let second = counter.begin();
        assert_eq!(
            counter.end_for(first, false),
            Some(PlaybackEnd::Interrupted)
        );
        assert_eq!(counter.end_for(second, false), None);
        assert_eq!(counter.end_for(second, true), Some(PlaybackEnd::Completed));
    }

    #[test]
    fn a_superseded_utterance_never_reports_completed() {
        let counter = UtteranceCounter::default();
        let first = counter.begin();
        let _ = counter.begin();

        // a stale ticket resolves Interrupted even if its samples ran out
        assert_eq!(counter.end_for(first, true), Some(PlaybackEnd::Interrupted));
    }

    #[test]
    fn cancel_invalidates_the_current_ticket() {
        let counter = UtteranceCounter::default();
        let ticket = counter.begin();

        counter.supersede();
        assert!(!counter.is_current(ticket));
        assert_eq!(
            counter.end_for(ticket, false),
            Some(PlaybackEnd::Interrupted)
        );
    }

    #[test]
    fn an_utterance_completes_only_once_finished() {
        let counter = UtteranceCounter::default();
        let ticket = counter.begin();

        assert_eq!(counter.end_for(ticket, false), None);
        assert_eq!(counter.end_for(ticket, true), Some(PlaybackEnd::Completed));
    }
}
