use std::time::{Duration, Instant};

use super::signature::TimeSignature;
use super::tempo::Tempo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    /// `start_reference` is when the run began; phase corrections are
    /// computed from it rather than from how many ticks happened.
    Running { start_reference: Instant },
}

/// Timing for a tick source: first tick at `first_deadline`, then every
/// `period` after it. The deadline is absolute so the grid stays anchored to
/// the `now` the plan was built from, however late the source is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    pub first_deadline: Instant,
    pub period: Duration,
}

/// The beat-counting state machine. Holds no timers and reads no clock; the
/// caller passes `now` in and arms a tick source from the returned plan.
#[derive(Debug, Clone)]
pub struct BeatScheduler {
    state: SchedulerState,
    beat: u32,
    tempo: Tempo,
    signature: TimeSignature,
    muted: bool,
}

impl BeatScheduler {
    pub fn new(tempo: Tempo, signature: TimeSignature, muted: bool) -> Self {
        Self {
            state: SchedulerState::Stopped,
            beat: 1,
            tempo,
            signature,
            muted,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    pub fn start_reference(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Running { start_reference } => Some(start_reference),
            SchedulerState::Stopped => None,
        }
    }

    pub fn current_beat(&self) -> u32 {
        self.beat
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn signature(&self) -> TimeSignature {
        self.signature
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn beat_duration(&self) -> Duration {
        self.tempo.beat_duration()
    }

    /// Begin a run at `now` and return the beat to click immediately.
    ///
    /// The counter snaps to 1 unless it sits on the last beat of a cycle that
    /// closes on an accent (the flamenco count starting "on 12").
    pub fn start(&mut self, now: Instant) -> (u32, TickPlan) {
        self.beat = self.start_beat();

        self.state = SchedulerState::Running {
            start_reference: now,
        };

        let period = self.beat_duration();
        (
            self.beat,
            TickPlan {
                first_deadline: now + period,
                period,
            },
        )
    }

    /// The beat the next [`BeatScheduler::start`] begins on: the stored beat
    /// when it is the closing accent of the cycle, otherwise 1.
    pub fn start_beat(&self) -> u32 {
        let config = self.signature.config();
        if self.beat == config.cycle_length && config.resumes_on_closing_accent() {
            self.beat
        } else {
            1
        }
    }

    /// Returns whether a run was actually stopped.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        self.state = SchedulerState::Stopped;
        was_running
    }

    /// Move to the next beat, wrapping after the cycle length.
    pub fn advance(&mut self) -> u32 {
        let cycle_length = self.signature.cycle_length();
        self.beat = if self.beat >= cycle_length {
            1
        } else {
            self.beat + 1
        };
        self.beat
    }

    /// Beat implied by the time elapsed since the run started at the current
    /// tempo, with the delay until the next beat boundary.
    pub fn phase_at(&self, now: Instant) -> Option<(u32, Duration)> {
        let start_reference = self.start_reference()?;

        let beat_ms = self.tempo.beat_millis();
        let elapsed_ms = now.saturating_duration_since(start_reference).as_nanos() as f64 / 1e6;
        let elapsed_beats = (elapsed_ms / beat_ms).floor() as u64;
        let expected = (elapsed_beats % u64::from(self.signature.cycle_length())) as u32 + 1;
        let to_next_beat_ms = beat_ms - (elapsed_ms % beat_ms);

        Some((
            expected,
            Duration::from_secs_f64(to_next_beat_ms / 1000.0),
        ))
    }

    /// Realign after a parameter change. Sets the counter to the phase beat
    /// right away and returns a plan whose first tick lands on the next beat
    /// boundary. `None` when stopped.
    pub fn resync(&mut self, now: Instant) -> Option<TickPlan> {
        let (expected, to_next_beat) = self.phase_at(now)?;
        self.beat = expected;
        Some(TickPlan {
            first_deadline: now + to_next_beat,
            period: self.beat_duration(),
        })
    }

    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Change the cycle. A counter past the new cycle length restarts at 1.
    pub fn set_signature(&mut self, signature: TimeSignature) {
        self.signature = signature;
        if self.beat > signature.cycle_length() {
            self.beat = 1;
        }
    }

    /// Override the counter, clamped into the cycle. Returns the stored beat.
    pub fn set_current_beat(&mut self, beat: u32) -> u32 {
        self.beat = self.signature.config().clamp_beat(beat);
        self.beat
    }
}
