pub mod click;
pub mod mixer;
pub mod stream;

pub use click::{CLICK_QUEUE_CAPACITY, ClickSynthesizer, ClickTone};
pub use mixer::ClickMixer;
pub use stream::{AudioOutput, enumerate_output_devices};
