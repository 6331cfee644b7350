pub mod facade;
pub mod scheduler;
pub mod signature;
pub mod tap_tempo;
pub mod tempo;
mod ticker;

pub use facade::Metronome;
pub use scheduler::{BeatScheduler, SchedulerState, TickPlan};
pub use signature::{SignatureConfig, TimeSignature};
pub use tap_tempo::{TapTempoEstimator, TapTempoSettings};
pub use tempo::{BpmRange, Tempo, TempoError};

/// State changes published to observers such as the terminal UI.
#[derive(Debug, Clone, PartialEq)]
pub enum MetronomeEvent {
    Started,
    Stopped,
    Beat(u32),
    BpmChanged(f64),
    SignatureChanged(TimeSignature),
    MuteToggled(bool),
}
