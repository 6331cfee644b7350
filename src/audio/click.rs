use rtrb::{Consumer, Producer, RingBuffer};

use crate::metronome::TimeSignature;

/// Parameters of a single click: a sine burst decaying exponentially from
/// `gain` to silence over `duration_secs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickTone {
    pub frequency_hz: f32,
    pub gain: f32,
    pub duration_secs: f32,
}

impl ClickTone {
    pub const fn new(frequency_hz: f32, gain: f32, duration_secs: f32) -> Self {
        Self {
            frequency_hz,
            gain,
            duration_secs,
        }
    }
}

/// Queue depth between the scheduler and the output callback. Clicks are at
/// least 200 ms apart, so this only fills when no callback is draining it.
pub const CLICK_QUEUE_CAPACITY: usize = 64;

/// Turns beats into clicks and hands them to the audio callback.
///
/// Without an output attached every emission is dropped, which keeps the
/// scheduler running silently when no device could be opened.
pub struct ClickSynthesizer {
    producer: Option<Producer<ClickTone>>,
    dropped: u64,
}

impl ClickSynthesizer {
    /// A synthesizer wired to a fresh queue; the consumer goes to
    /// [`crate::audio::ClickMixer`].
    pub fn channel(capacity: usize) -> (Self, Consumer<ClickTone>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        (
            Self {
                producer: Some(producer),
                dropped: 0,
            },
            consumer,
        )
    }

    /// A synthesizer with no audio output.
    pub fn silent() -> Self {
        Self {
            producer: None,
            dropped: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.producer
            .as_ref()
            .is_some_and(|producer| !producer.is_abandoned())
    }

    /// Clicks that could not be queued since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue the click for `beat`. Returns whether a click was queued; muted
    /// or disconnected emissions are no-ops.
    pub fn emit(&mut self, beat: u32, signature: TimeSignature, muted: bool) -> bool {
        if muted {
            return false;
        }
        let Some(producer) = self.producer.as_mut() else {
            return false;
        };

        let tone = signature.config().tone_for(beat);
        match producer.push(tone) {
            Ok(()) => true,
            Err(_) => {
                self.dropped += 1;
                false
            }
        }
    }
}

impl std::fmt::Debug for ClickSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickSynthesizer")
            .field("connected", &self.is_connected())
            .field("dropped", &self.dropped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muted_emit_is_noop() {
        let (mut synth, mut consumer) = ClickSynthesizer::channel(4);
        assert!(!synth.emit(1, TimeSignature::EightBeat, true));
        assert!(consumer.pop().is_err());
    }

    #[test]
    fn test_emit_picks_tone_for_beat() {
        let (mut synth, mut consumer) = ClickSynthesizer::channel(4);
        assert!(synth.emit(1, TimeSignature::EightBeat, false));
        assert!(synth.emit(2, TimeSignature::EightBeat, false));
        assert!(synth.emit(12, TimeSignature::Flamenco12, false));

        let strong = consumer.pop().unwrap();
        let weak = consumer.pop().unwrap();
        let accent = consumer.pop().unwrap();
        assert_eq!(strong, ClickTone::new(800.0, 0.7, 0.2));
        assert_eq!(weak, ClickTone::new(600.0, 0.5, 0.1));
        assert_eq!(accent, ClickTone::new(400.0, 0.8, 0.2));
    }

    #[test]
    fn test_silent_synth_drops_quietly() {
        let mut synth = ClickSynthesizer::silent();
        assert!(!synth.is_connected());
        assert!(!synth.emit(1, TimeSignature::EightBeat, false));
        assert_eq!(synth.dropped(), 0);
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let (mut synth, _consumer) = ClickSynthesizer::channel(1);
        assert!(synth.emit(1, TimeSignature::EightBeat, false));
        assert!(!synth.emit(2, TimeSignature::EightBeat, false));
        assert_eq!(synth.dropped(), 1);
    }

    #[test]
    fn test_abandoned_queue_reports_disconnected() {
        let (synth, consumer) = ClickSynthesizer::channel(4);
        assert!(synth.is_connected());
        drop(consumer);
        assert!(!synth.is_connected());
    }
}
