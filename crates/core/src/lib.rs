pub mod analytics;
pub mod catalog;
pub mod config;
pub mod emotion;
pub mod playback;
pub mod session;
pub mod util;
