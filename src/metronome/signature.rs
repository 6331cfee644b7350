use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::ClickTone;

/// Beat cycles the metronome can count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSignature {
    /// Two 4/4 measures, accents on 1 and 5.
    #[default]
    #[value(name = "eight-beat")]
    EightBeat,
    /// Flamenco compás with accents on 3, 6, 8, 10 and 12.
    #[value(name = "flamenco-12")]
    #[serde(rename = "flamenco-12")]
    Flamenco12,
}

/// Static description of a signature: cycle length, accents and click timbre.
#[derive(Debug, PartialEq)]
pub struct SignatureConfig {
    pub cycle_length: u32,
    pub strong_beats: &'static [u32],
    pub label: &'static str,
    pub description: &'static str,
    pub strong_tone: ClickTone,
    pub weak_tone: ClickTone,
}

static EIGHT_BEAT: SignatureConfig = SignatureConfig {
    cycle_length: 8,
    strong_beats: &[1, 5],
    label: "4/4",
    description: "Two 4/4 measures",
    strong_tone: ClickTone::new(800.0, 0.7, 0.2),
    weak_tone: ClickTone::new(600.0, 0.5, 0.1),
};

// The accent sits below the weak click to imitate a separate palmas/cajón hit.
static FLAMENCO_12: SignatureConfig = SignatureConfig {
    cycle_length: 12,
    strong_beats: &[3, 6, 8, 10, 12],
    label: "12/8",
    description: "Flamenco 12-beat compás",
    strong_tone: ClickTone::new(400.0, 0.8, 0.2),
    weak_tone: ClickTone::new(600.0, 0.4, 0.1),
};

impl TimeSignature {
    pub const ALL: [TimeSignature; 2] = [TimeSignature::EightBeat, TimeSignature::Flamenco12];

    /// Registry lookup.
    pub fn config(self) -> &'static SignatureConfig {
        match self {
            TimeSignature::EightBeat => &EIGHT_BEAT,
            TimeSignature::Flamenco12 => &FLAMENCO_12,
        }
    }

    pub fn cycle_length(self) -> u32 {
        self.config().cycle_length
    }

    pub fn is_strong(self, beat: u32) -> bool {
        self.config().is_strong(beat)
    }

    /// The other built-in signature, in registry order.
    pub fn toggled(self) -> Self {
        match self {
            TimeSignature::EightBeat => TimeSignature::Flamenco12,
            TimeSignature::Flamenco12 => TimeSignature::EightBeat,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.config();
        write!(f, "{} ({})", config.label, config.description)
    }
}

impl SignatureConfig {
    pub fn is_strong(&self, beat: u32) -> bool {
        self.strong_beats.contains(&beat)
    }

    pub fn tone_for(&self, beat: u32) -> ClickTone {
        if self.is_strong(beat) {
            self.strong_tone
        } else {
            self.weak_tone
        }
    }

    /// True when the gaps between consecutive accents (wrapping around the
    /// cycle) are not all equal. Tap tempo treats such cycles specially.
    pub fn has_uneven_accents(&self) -> bool {
        let Some((&first, rest)) = self.strong_beats.split_first() else {
            return false;
        };

        let mut previous = first;
        let mut gaps = Vec::with_capacity(self.strong_beats.len());
        for &beat in rest {
            gaps.push(beat - previous);
            previous = beat;
        }
        gaps.push(self.cycle_length - previous + first);

        gaps.windows(2).any(|pair| pair[0] != pair[1])
    }

    /// Whether a run may begin on the last beat instead of beat 1. True when
    /// that beat is an accent, as with the flamenco 12.
    pub fn resumes_on_closing_accent(&self) -> bool {
        self.is_strong(self.cycle_length)
    }

    /// Clamp an arbitrary beat number into `1..=cycle_length`.
    pub fn clamp_beat(&self, beat: u32) -> u32 {
        beat.clamp(1, self.cycle_length)
    }
}
