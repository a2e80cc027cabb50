//! Two-source voice-activity estimator: fuses a cheap local energy measure
//! on the telephony-side PCM with speech-started/stopped events reported by
//! the realtime peer, into a single debounced `human_speaking` predicate.
//!
//! Fusing both sources matters because the local estimator reacts
//! immediately while the peer's own VAD needs a moment to commit a
//! speech-started event; during that gap the barge-in gate still needs to
//! know the human is talking.

use std::time::{Duration, Instant};

/// Mean-abs-sample threshold above which a frame counts as speech.
pub const ENERGY_THRESHOLD: i64 = 500;
/// How long to keep `human_speaking` true after local energy drops quiet.
pub const HANGOVER_MS: u64 = 600;

pub struct Vad {
    energy_threshold: i64,
    hangover: Duration,
    human_speaking: bool,
    last_human_speech_at: Option<Instant>,
}

impl Default for Vad {
    fn default() -> Self {
        Self::new(ENERGY_THRESHOLD, HANGOVER_MS)
    }
}

impl Vad {
    pub fn new(energy_threshold: i64, hangover_ms: u64) -> Self {
        Self {
            energy_threshold,
            hangover: Duration::from_millis(hangover_ms),
            human_speaking: false,
            last_human_speech_at: None,
        }
    }

    pub fn human_speaking(&self) -> bool {
        self.human_speaking
    }

    pub fn last_human_speech_at(&self) -> Option<Instant> {
        self.last_human_speech_at
    }

    /// Feed one frame of 8kHz PCM16 samples from the telephony side.
    pub fn observe_local_frame(&mut self, samples: &[i16], now: Instant) {
        if samples.is_empty() {
            return;
        }
        let sum: i64 = samples.iter().map(|&s| (s as i64).abs()).sum();
        let mean = sum / samples.len() as i64;

        if mean > self.energy_threshold {
            self.human_speaking = true;
            self.last_human_speech_at = Some(now);
        } else if self.human_speaking {
            let last = self
                .last_human_speech_at
                .expect("human_speaking true implies a stamped timestamp");
            if now.duration_since(last) > self.hangover {
                self.human_speaking = false;
            }
        }
    }

    /// The realtime peer reported `input_audio_buffer.speech_started`.
    pub fn on_peer_speech_started(&mut self, now: Instant) {
        self.human_speaking = true;
        self.last_human_speech_at = Some(now);
    }

    /// The realtime peer reported `input_audio_buffer.speech_stopped`.
    /// Clears unconditionally, regardless of local energy.
    pub fn on_peer_speech_stopped(&mut self) {
        self.human_speaking = false;
    }
}
