pub mod audio;
pub mod config;
pub mod metronome;
pub mod ui;

pub use config::Config;
pub use metronome::{Metronome, MetronomeEvent, TimeSignature};
pub use ui::TerminalUI;
