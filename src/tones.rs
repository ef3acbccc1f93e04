//! Synthesised tone cues
//!
//! Each [`Cue`] has its own short pattern of sine tones. Playback runs on a
//! dedicated thread that owns the audio output stream, so [`ToneCues::emit`]
//! only queues the cue and returns.

use rodio::source::SineWave;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::cues::{Cue, CueSink};

/// Tone frequencies in Hz
pub mod frequencies {
    /// C4
    pub const LOW: f32 = 261.63;
    /// E4
    pub const MEDIUM: f32 = 329.63;
    /// G4
    pub const HIGH: f32 = 392.00;
    /// C5
    pub const VERY_HIGH: f32 = 523.25;
}

/// Tone durations in milliseconds
pub mod durations {
    pub const GAP: u64 = 60;
    pub const QUICK: u64 = 120;
    pub const STANDARD: u64 = 250;
    pub const LONG: u64 = 500;
}

#[derive(Debug, Error)]
pub enum ToneError {
    #[error("Audio device unavailable: {0}")]
    Device(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// A sine tone, or silence when the frequency is zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: u64,
}

impl Tone {
    pub fn new(frequency_hz: f32, duration_ms: u64) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }

    pub fn pause(duration_ms: u64) -> Self {
        Self::new(0.0, duration_ms)
    }

    pub fn is_pause(&self) -> bool {
        self.frequency_hz <= 0.0
    }
}

/// Tone sequence played for a cue.
///
/// The start rises, a rest is one long low tone and a new stage is a
/// high double beep, so the three can be told apart without looking.
pub fn pattern(cue: Cue) -> Vec<Tone> {
    match cue {
        Cue::Start => vec![
            Tone::new(frequencies::LOW, durations::QUICK),
            Tone::pause(durations::GAP),
            Tone::new(frequencies::MEDIUM, durations::QUICK),
            Tone::pause(durations::GAP),
            Tone::new(frequencies::VERY_HIGH, durations::STANDARD),
        ],
        Cue::Rest => vec![Tone::new(frequencies::LOW, durations::LONG)],
        Cue::NextStage => vec![
            Tone::new(frequencies::HIGH, durations::QUICK),
            Tone::pause(durations::GAP),
            Tone::new(frequencies::HIGH, durations::QUICK),
        ],
    }
}

/// Total play time of a pattern, pauses included
pub fn pattern_duration(tones: &[Tone]) -> Duration {
    Duration::from_millis(tones.iter().map(|t| t.duration_ms).sum())
}

/// Plays cue patterns on the default audio output
#[derive(Debug)]
pub struct ToneCues {
    queue: Sender<Cue>,
}

impl ToneCues {
    /// Open the default output device on a playback thread.
    ///
    /// Fails when no device can be opened. `volume` is clamped to `0.0..=1.0`.
    pub fn open(volume: f32) -> Result<Self, ToneError> {
        let volume = volume.clamp(0.0, 1.0);
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (queue, cues) = mpsc::channel();

        thread::Builder::new()
            .name("yoyors-cues".to_string())
            .spawn(move || playback_loop(cues, ready_tx, volume))
            .map_err(|e| ToneError::Device(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| ToneError::Device("playback thread exited".to_string()))??;

        tracing::debug!(volume, "Tone cues ready");
        Ok(Self { queue })
    }
}

impl CueSink for ToneCues {
    fn emit(&mut self, cue: Cue) {
        if self.queue.send(cue).is_err() {
            tracing::warn!(?cue, "Tone playback stopped; cue dropped");
        }
    }
}

// The output stream is not Send, so it is opened and kept on this thread.
fn playback_loop(cues: Receiver<Cue>, ready: SyncSender<Result<(), ToneError>>, volume: f32) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(ToneError::Device(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    for cue in cues {
        if let Err(e) = play(&handle, &pattern(cue), volume) {
            tracing::warn!(?cue, error = %e, "Failed to play cue");
        }
    }
    tracing::debug!("Tone playback thread finished");
}

fn play(handle: &OutputStreamHandle, tones: &[Tone], volume: f32) -> Result<(), ToneError> {
    let sink = Sink::try_new(handle).map_err(|e| ToneError::Playback(e.to_string()))?;

    for tone in tones {
        if tone.is_pause() {
            sink.sleep_until_end();
            thread::sleep(Duration::from_millis(tone.duration_ms));
        } else {
            let source = SineWave::new(tone.frequency_hz)
                .take_duration(Duration::from_millis(tone.duration_ms))
                .amplify(volume);
            sink.append(source);
        }
    }

    sink.sleep_until_end();
    Ok(())
}
