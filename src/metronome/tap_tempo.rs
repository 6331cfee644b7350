use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

use super::signature::TimeSignature;
use super::tempo::{BpmRange, Tempo};

/// Thresholds for the accent-tapping heuristic. They were tuned by ear, not
/// derived; the defaults reproduce the web version's behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapTempoSettings {
    /// Number of taps kept.
    pub history: usize,
    /// Taps needed before pattern detection runs.
    pub pattern_min_taps: usize,
    /// Tapping counts as regular when `variance < regularity_ratio * mean`.
    pub regularity_ratio: f64,
    /// Regular tapping faster than this is taken to be accents only.
    pub accent_threshold_bpm: f64,
    /// Factor applied to the baseline when accent tapping is detected.
    pub accent_scale: f64,
}

impl Default for TapTempoSettings {
    fn default() -> Self {
        Self {
            history: 8,
            pattern_min_taps: 6,
            regularity_ratio: 0.15,
            accent_threshold_bpm: 200.0,
            accent_scale: 0.6,
        }
    }
}

/// Best-effort tempo estimation from tap timestamps.
///
/// Every tap is read as a quarter note. For cycles whose accents are unevenly
/// spaced a dancer often claps the accents instead, which shows up as a
/// steady but implausibly fast tempo; in that case the estimate is scaled
/// down. Irregular tapping cannot be recovered reliably and falls back to the
/// plain average.
#[derive(Debug, Clone)]
pub struct TapTempoEstimator {
    taps: VecDeque<Instant>,
    settings: TapTempoSettings,
}

impl TapTempoEstimator {
    pub fn new(settings: TapTempoSettings) -> Self {
        let history = settings.history.max(2);
        Self {
            taps: VecDeque::with_capacity(history + 1),
            settings: TapTempoSettings { history, ..settings },
        }
    }

    pub fn record_tap_at(&mut self, now: Instant) {
        self.taps.push_back(now);
        while self.taps.len() > self.settings.history {
            self.taps.pop_front();
        }
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Tempo implied by the recorded taps, clamped to the adjust range.
    /// `None` until at least two taps exist.
    pub fn estimated_tempo(&self, signature: TimeSignature) -> Option<Tempo> {
        let bpm = self.raw_estimate(signature)?;
        Tempo::new(bpm, BpmRange::ADJUST).ok()
    }

    fn raw_estimate(&self, signature: TimeSignature) -> Option<f64> {
        if self.taps.len() < 2 {
            return None;
        }

        let intervals: Vec<f64> = self
            .taps
            .iter()
            .zip(self.taps.iter().skip(1))
            .map(|(earlier, later)| later.duration_since(*earlier).as_secs_f64() * 1000.0)
            .collect();
        let avg_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if avg_interval <= 0.0 {
            // Simultaneous taps read as infinitely fast.
            return Some(BpmRange::ADJUST.max);
        }

        let baseline = 60_000.0 / avg_interval;

        if !signature.config().has_uneven_accents()
            || self.taps.len() < self.settings.pattern_min_taps
        {
            return Some(baseline);
        }

        let variance = intervals
            .iter()
            .map(|interval| (interval - avg_interval).powi(2))
            .sum::<f64>()
            / intervals.len() as f64;
        let is_regular = variance < avg_interval * self.settings.regularity_ratio;

        if is_regular && baseline > self.settings.accent_threshold_bpm {
            log::debug!(
                "tap tempo: regular accent tapping at {:.1} BPM, scaling by {}",
                baseline,
                self.settings.accent_scale
            );
            Some(baseline * self.settings.accent_scale)
        } else {
            Some(baseline)
        }
    }
}

impl Default for TapTempoEstimator {
    fn default() -> Self {
        Self::new(TapTempoSettings::default())
    }
}
