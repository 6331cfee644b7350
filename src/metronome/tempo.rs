use thiserror::Error;

/// Clamp range for a tempo entry path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmRange {
    pub min: f64,
    pub max: f64,
}

impl BpmRange {
    /// Used by `set_bpm`, `adjust_bpm` and tap tempo.
    pub const ADJUST: BpmRange = BpmRange {
        min: 40.0,
        max: 300.0,
    };
    /// Used when the user types a value.
    pub const DIRECT_ENTRY: BpmRange = BpmRange {
        min: 30.0,
        max: 300.0,
    };
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TempoError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("tempo must be finite")]
    NotFinite,
    #[error("tempo must be positive, got {0}")]
    NotPositive(f64),
}

/// Beats per minute, clamped to a [`BpmRange`] and rounded to hundredths.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Tempo(f64);

impl Tempo {
    /// Validate and clamp a raw value. Non-finite and non-positive values are
    /// rejected rather than clamped.
    pub fn new(bpm: f64, range: BpmRange) -> Result<Self, TempoError> {
        if !bpm.is_finite() {
            return Err(TempoError::NotFinite);
        }
        if bpm <= 0.0 {
            return Err(TempoError::NotPositive(bpm));
        }
        Ok(Self::clamped(bpm, range))
    }

    /// Clamp without validation; callers must pass a finite value.
    pub(crate) fn clamped(bpm: f64, range: BpmRange) -> Self {
        let bpm = bpm.clamp(range.min, range.max);
        Tempo((bpm * 100.0).round() / 100.0)
    }

    /// Parse a free-form decimal, like a number pasted into the BPM field.
    pub fn parse(text: &str, range: BpmRange) -> Result<Self, TempoError> {
        let trimmed = text.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| TempoError::NotANumber(trimmed.to_string()))?;
        Self::new(value, range)
    }

    /// Parse a typed entry: the fractional part is dropped, then the value is
    /// clamped to [`BpmRange::DIRECT_ENTRY`].
    pub fn parse_entry(text: &str) -> Result<Self, TempoError> {
        let trimmed = text.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| TempoError::NotANumber(trimmed.to_string()))?;
        Self::new(value.trunc(), BpmRange::DIRECT_ENTRY)
    }

    pub fn bpm(self) -> f64 {
        self.0
    }

    /// Length of one beat in milliseconds.
    pub fn beat_millis(self) -> f64 {
        60_000.0 / self.0
    }

    pub fn beat_duration(self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(60.0 / self.0)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo(100.0)
    }
}
