//! Utterance endpointing
//!
//! Energy-based detection of a single spoken utterance: wait for speech,
//! accumulate it, and end the segment after trailing silence. One detector
//! instance delimits exactly one utterance per capture cycle.

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to accept an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Leading silence before giving up on hearing anything (in samples)
const MAX_LEAD_IN_SAMPLES: usize = 128_000; // 8 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech to begin
    Waiting,
    /// Speech detected, accumulating the utterance
    InSpeech,
}

/// Delimits one utterance in a stream of microphone samples
pub struct UtteranceDetector {
    state: EndpointState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    lead_in_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector waiting for the start of speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: EndpointState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            lead_in_counter: 0,
        }
    }

    /// Feed captured samples; returns true once the utterance is complete
    /// (enough speech followed by enough silence).
    pub fn push(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            EndpointState::Waiting => {
                if is_speech {
                    self.state = EndpointState::InSpeech;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.lead_in_counter += samples.len();
                }
                false
            }
            EndpointState::InSpeech => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.speech_buffer.len(),
                    silence = self.silence_counter,
                    is_speech,
                    "accumulating utterance"
                );

                self.silence_counter > SILENCE_SAMPLES
                    && self.speech_buffer.len() > MIN_SPEECH_SAMPLES
            }
        }
    }

    /// True when no speech arrived within the lead-in window
    #[must_use]
    pub const fn no_speech_timeout(&self) -> bool {
        matches!(self.state, EndpointState::Waiting) && self.lead_in_counter > MAX_LEAD_IN_SAMPLES
    }

    /// Take the accumulated utterance, clearing the buffer
    pub fn take_utterance(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Current detector state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    /// Reset to waiting for speech
    pub fn reset(&mut self) {
        self.state = EndpointState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
        self.lead_in_counter = 0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_samples: usize, amplitude: f32) -> Vec<f32> {
        (0..duration_samples)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn energy_of_silence_is_near_zero() {
        assert!(calculate_energy(&vec![0.0f32; 100]) < 0.001);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn silence_does_not_start_an_utterance() {
        let mut detector = UtteranceDetector::new();
        assert!(!detector.push(&vec![0.0f32; 1600]));
        assert_eq!(detector.state(), EndpointState::Waiting);
    }

    #[test]
    fn speech_then_silence_completes_the_utterance() {
        let mut detector = UtteranceDetector::new();

        // Half a second of tone puts the detector in speech
        assert!(!detector.push(&tone(8000, 0.3)));
        assert_eq!(detector.state(), EndpointState::InSpeech);

        // Trailing silence past the threshold ends the segment
        let done = detector.push(&vec![0.0f32; 9000]);
        assert!(done);
        assert!(detector.take_utterance().len() > MIN_SPEECH_SAMPLES);
    }

    #[test]
    fn lead_in_timeout_fires_without_speech() {
        let mut detector = UtteranceDetector::new();
        for _ in 0..90 {
            detector.push(&vec![0.0f32; 1600]);
        }
        assert!(detector.no_speech_timeout());

        detector.reset();
        assert!(!detector.no_speech_timeout());
        assert_eq!(detector.state(), EndpointState::Waiting);
    }
}
