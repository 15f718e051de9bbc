use crate::analytics::{generate_insights, Insight, SessionSnapshot};
use crate::emotion::EmotionTick;
use crate::playback::PlayerView;
use crate::session::{Command, SessionEvent};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session loop is no longer running")]
    Closed,
}

/// Cloneable front door to a running [`crate::session::Session`].
///
/// Commands are fire-and-forget; queries wait for the session loop to
/// answer after everything sent before them has been applied.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn start_session(&self) -> Result<(), SessionError> {
        self.command(Command::Start)
    }

    pub fn stop_session(&self) -> Result<(), SessionError> {
        self.command(Command::Stop)
    }

    pub fn reset_session(&self) -> Result<(), SessionError> {
        self.command(Command::Reset)
    }

    pub fn on_emotion_tick(&self, tick: EmotionTick) -> Result<(), SessionError> {
        self.send(SessionEvent::Tick(tick))
    }

    pub fn play(&self) -> Result<(), SessionError> {
        self.command(Command::Play)
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.command(Command::Pause)
    }

    pub fn toggle_play_pause(&self) -> Result<(), SessionError> {
        self.command(Command::TogglePlayPause)
    }

    pub fn next(&self) -> Result<(), SessionError> {
        self.command(Command::Next)
    }

    pub fn previous(&self) -> Result<(), SessionError> {
        self.command(Command::Previous)
    }

    /// `percent` is clamped to 0..=100 by the controller.
    pub fn seek(&self, percent: f64) -> Result<(), SessionError> {
        self.command(Command::Seek(percent))
    }

    pub fn set_volume(&self, level: f32) -> Result<(), SessionError> {
        self.command(Command::SetVolume(level))
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Snapshot(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn player(&self) -> Result<PlayerView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Player(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Insights for a frozen copy of the current statistics.
    pub async fn insights(&self) -> Result<Vec<Insight>, SessionError> {
        let snapshot = self.snapshot().await?;
        Ok(generate_insights(&snapshot))
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Shutdown)
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.send(SessionEvent::Command(command))
    }

    fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.tx.send(event).map_err(|_| SessionError::Closed)
    }
}
