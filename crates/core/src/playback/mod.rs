#[cfg(feature = "rodio-output")]
mod audio;
mod controller;
mod dummy;
mod queue;
mod transport;

use crate::catalog::Track;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "rodio-output")]
pub use audio::RodioAudioSink;
pub use controller::{AutoplayToken, PlayerView, QueueController};
pub use dummy::DummyAudioSink;
pub use queue::Queue;
pub use transport::{transition, SignalEffect, TransportState};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },

    #[error("stream failed: {details}")]
    StreamFailed { details: String },

    #[error("seek failed: {details}")]
    SeekFailed { details: String },
}

/// Identifies one `load` call on a sink. Signals carry the id of the load
/// they belong to so late signals for a replaced track can be dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(pub u64);

impl LoadId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkSignal {
    LoadStart,
    CanPlay,
    Ended,
    Error { details: String },
}

impl SinkSignal {
    pub fn name(&self) -> &'static str {
        match self {
            SinkSignal::LoadStart => "loadstart",
            SinkSignal::CanPlay => "canplay",
            SinkSignal::Ended => "ended",
            SinkSignal::Error { .. } => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkEvent {
    pub load_id: LoadId,
    pub signal: SinkSignal,
}

/// Where a sink reports its signals.
#[derive(Clone)]
pub struct SinkEvents(Arc<dyn Fn(SinkEvent) + Send + Sync>);

impl SinkEvents {
    pub fn new(f: impl Fn(SinkEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn emit(&self, load_id: LoadId, signal: SinkSignal) {
        tracing::trace!(%load_id, signal = signal.name(), "sink signal");
        (self.0)(SinkEvent { load_id, signal });
    }
}

impl fmt::Debug for SinkEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SinkEvents(..)")
    }
}

/// Audio output capability consumed by the queue controller.
///
/// `load` must be followed by `LoadStart` and then either `CanPlay` or
/// `Error` for the same [`LoadId`]; `Ended` is reported once the loaded
/// stream has played to completion.
pub trait AudioSink {
    fn attach(&mut self, events: SinkEvents);
    fn load(&mut self, track: &Track, load_id: LoadId);
    fn unload(&mut self);
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError>;
    fn set_volume(&mut self, volume: f32);
    fn current_time(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
}
