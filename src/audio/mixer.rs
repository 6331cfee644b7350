// src/audio/mixer.rs
// Click voice rendering for the output callback

use rtrb::Consumer;
use std::f32::consts::TAU;

use super::ClickTone;

/// Level the exponential decay reaches at the end of a click.
const DECAY_FLOOR: f32 = 0.001;

/// Voices beyond this are ignored; no allocation happens in the callback.
pub const MAX_VOICES: usize = 32;

#[derive(Debug, Clone)]
struct Voice {
    phase: f32,
    phase_step: f32,
    level: f32,
    decay: f32,
    remaining: u32,
}

impl Voice {
    fn new(tone: ClickTone, sample_rate: f32) -> Self {
        let total = (tone.duration_secs * sample_rate).round().max(1.0) as u32;
        let gain = tone.gain.max(DECAY_FLOOR);
        Self {
            phase: 0.0,
            phase_step: TAU * tone.frequency_hz / sample_rate,
            level: gain,
            decay: (DECAY_FLOOR / gain).powf(1.0 / total as f32),
            remaining: total,
        }
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        let sample = self.phase.sin() * self.level;
        self.phase = (self.phase + self.phase_step) % TAU;
        self.level *= self.decay;
        self.remaining -= 1;
        sample
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Renders queued clicks into interleaved output buffers. Lives on the audio
/// thread; each voice is dropped as soon as its last sample is written.
pub struct ClickMixer {
    consumer: Consumer<ClickTone>,
    voices: Vec<Voice>,
    sample_rate: f32,
    volume: f32,
}

impl ClickMixer {
    pub fn new(consumer: Consumer<ClickTone>, sample_rate: u32, volume: f32) -> Self {
        Self {
            consumer,
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate: sample_rate as f32,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fill `output` (interleaved, `channels` wide) with the mix of all
    /// sounding clicks.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        while let Ok(tone) = self.consumer.pop() {
            if self.voices.len() < MAX_VOICES {
                self.voices.push(Voice::new(tone, self.sample_rate));
            }
        }

        let channels = channels.max(1);
        for frame in output.chunks_mut(channels) {
            let mut sample = 0.0;
            for voice in self.voices.iter_mut() {
                sample += voice.next_sample();
            }
            frame.fill((sample * self.volume).clamp(-1.0, 1.0));
        }

        self.voices.retain(|voice| !voice.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrb::RingBuffer;

    const RATE: u32 = 48_000;

    #[test]
    fn test_voice_is_disposed_after_duration() {
        let (mut producer, consumer) = RingBuffer::new(8);
        let mut mixer = ClickMixer::new(consumer, RATE, 1.0);
        producer.push(ClickTone::new(600.0, 0.5, 0.1)).unwrap();

        // 0.05 s: still sounding.
        let mut buffer = vec![0.0; 2400];
        mixer.render(&mut buffer, 1);
        assert_eq!(mixer.active_voices(), 1);
        assert!(buffer.iter().any(|s| s.abs() > 0.1));

        // Another 0.06 s covers the rest of the click.
        let mut buffer = vec![0.0; 2880];
        mixer.render(&mut buffer, 1);
        assert_eq!(mixer.active_voices(), 0);
        assert!(buffer[2500..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_concurrent_voices_mix_independently() {
        let (mut producer, consumer) = RingBuffer::new(8);
        let mut mixer = ClickMixer::new(consumer, RATE, 1.0);
        producer.push(ClickTone::new(800.0, 0.7, 0.2)).unwrap();
        producer.push(ClickTone::new(600.0, 0.5, 0.1)).unwrap();

        let mut buffer = vec![0.0; 960];
        mixer.render(&mut buffer, 2);
        assert_eq!(mixer.active_voices(), 2);

        // Stereo frames carry the same sample on both channels.
        for frame in buffer.chunks(2) {
            assert_eq!(frame[0], frame[1]);
            assert!(frame[0].abs() <= 1.0);
        }

        // The short click ends first.
        let mut buffer = vec![0.0; 4800];
        mixer.render(&mut buffer, 1);
        assert_eq!(mixer.active_voices(), 1);
    }

    #[test]
    fn test_zero_volume_is_silent() {
        let (mut producer, consumer) = RingBuffer::new(8);
        let mut mixer = ClickMixer::new(consumer, RATE, 0.0);
        producer.push(ClickTone::new(800.0, 0.7, 0.2)).unwrap();

        let mut buffer = vec![1.0; 512];
        mixer.render(&mut buffer, 1);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_decay_reaches_floor() {
        let mut voice = Voice::new(ClickTone::new(0.0, 0.8, 0.01), 1000.0);
        for _ in 0..10 {
            voice.next_sample();
        }
        assert!(voice.is_finished());
        assert!((voice.level - DECAY_FLOOR).abs() < 1e-4);
    }
}
