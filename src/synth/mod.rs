// Synthesis module - Click rendering and sample-accurate playback

pub mod click;
pub mod filter;
pub mod mixer;

pub use click::{ClickBank, ClickParams, render_click};
pub use mixer::ClickMixer;
