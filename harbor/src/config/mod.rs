//! Configuration

pub mod app;
pub mod duration;

pub use app::{AppConfig, CONFIG_FILE};
pub use duration::GoDuration;
