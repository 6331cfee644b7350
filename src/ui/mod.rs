pub mod beat_indicator;
pub mod terminal;

pub use terminal::TerminalUI;
