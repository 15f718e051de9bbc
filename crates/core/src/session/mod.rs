//! Single-task orchestration of one listening session.
//!
//! Every input (UI commands, classifier ticks, fetch completions, timer
//! firings and sink signals) is funnelled through one unbounded queue and
//! applied by [`Session::run`] in arrival order. The gate, the queue
//! controller and the aggregator are only ever touched from that loop.

mod handle;

pub use handle::{SessionError, SessionHandle};

use crate::analytics::{SessionAggregator, SessionSnapshot};
use crate::catalog::{ProviderError, Track, TrackProvider};
use crate::config::{PlayerConfig, CLOCK_INTERVAL};
use crate::emotion::{Emotion, EmotionGate, EmotionTick, QueueTrigger};
use crate::playback::{
    AudioSink, AutoplayToken, PlaybackError, PlayerView, QueueController, SinkEvent, SinkEvents,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Non-fatal outcomes worth showing to the user.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    PlayingForMood { emotion: Emotion, count: usize },
    QueuedForMood { emotion: Emotion, count: usize },
    NoTracksFound { emotion: Emotion },
    TrackFetchFailed { emotion: Emotion, reason: String },
    PlaybackFailed { details: String },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Command {
    Start,
    Stop,
    Reset,
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Seek(f64),
    SetVolume(f32),
}

#[derive(Debug)]
pub(crate) enum SessionEvent {
    Command(Command),
    Tick(EmotionTick),
    TracksFetched {
        generation: u64,
        trigger: QueueTrigger,
        result: Result<Vec<Track>, ProviderError>,
    },
    AutoplayDue(AutoplayToken),
    ClockTick,
    ProgressPoll,
    Sink(SinkEvent),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Player(oneshot::Sender<PlayerView>),
    Shutdown,
}

/// Tracking slots that live exactly as long as one session.
#[derive(Debug, Default)]
struct SessionState {
    generation: u64,
    gate: EmotionGate,
    fetch_in_flight: bool,
}

impl SessionState {
    fn next(&self) -> Self {
        Self {
            generation: self.generation + 1,
            ..Self::default()
        }
    }
}

pub struct Session<S> {
    config: PlayerConfig,
    provider: Arc<dyn TrackProvider>,
    controller: QueueController<S>,
    aggregator: SessionAggregator,
    state: SessionState,
    events: UnboundedReceiver<SessionEvent>,
    self_tx: WeakUnboundedSender<SessionEvent>,
    notify: UnboundedSender<Notification>,
    clock: Option<JoinHandle<()>>,
    autoplay: Option<JoinHandle<()>>,
    progress: Option<JoinHandle<()>>,
}

impl<S: AudioSink> Session<S> {
    pub fn new(
        config: PlayerConfig,
        provider: Arc<dyn TrackProvider>,
        sink: S,
    ) -> (Self, SessionHandle, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let self_tx = tx.downgrade();

        let mut controller = QueueController::new(sink, &config);
        controller.attach_sink(SinkEvents::new({
            let weak = self_tx.clone();
            move |event| {
                if let Some(tx) = weak.upgrade() {
                    let _ = tx.send(SessionEvent::Sink(event));
                }
            }
        }));

        let session = Self {
            config,
            provider,
            controller,
            aggregator: SessionAggregator::new(),
            state: SessionState::default(),
            events: rx,
            self_tx,
            notify: notify_tx,
            clock: None,
            autoplay: None,
            progress: None,
        };
        (session, SessionHandle::new(tx), notify_rx)
    }

    /// Processes events until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        self.progress = Some(self.spawn_ticker(|| SessionEvent::ProgressPoll));

        while let Some(event) = self.events.recv().await {
            match event {
                SessionEvent::Command(command) => self.on_command(command),
                SessionEvent::Tick(tick) => self.on_tick(tick),
                SessionEvent::TracksFetched {
                    generation,
                    trigger,
                    result,
                } => self.on_tracks_fetched(generation, trigger, result),
                SessionEvent::AutoplayDue(token) => {
                    self.autoplay = None;
                    let outcome = self.controller.autoplay_due(token);
                    self.report(outcome.map(|_| ()));
                }
                SessionEvent::ClockTick => self.aggregator.refresh_duration(),
                SessionEvent::ProgressPoll => self.controller.refresh_progress(),
                SessionEvent::Sink(event) => {
                    let outcome = self.controller.on_sink_event(event);
                    self.report(outcome);
                }
                SessionEvent::Snapshot(reply) => {
                    let _ = reply.send(self.aggregator.snapshot());
                }
                SessionEvent::Player(reply) => {
                    let _ = reply.send(self.controller.view());
                }
                SessionEvent::Shutdown => break,
            }
        }

        self.cancel_timers();
        abort(&mut self.progress);
        tracing::debug!("session loop finished");
    }

    fn on_command(&mut self, command: Command) {
        tracing::debug!(?command, "session command");
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Reset => self.reset(),
            Command::Play => {
                let outcome = self.controller.play();
                self.report(outcome);
            }
            Command::Pause => self.controller.pause(),
            Command::TogglePlayPause => {
                let outcome = self.controller.toggle_play_pause();
                self.report(outcome);
            }
            Command::Next => {
                let outcome = self.controller.next();
                self.report(outcome);
            }
            Command::Previous => {
                let outcome = self.controller.previous();
                self.report(outcome);
            }
            Command::Seek(percent) => {
                let outcome = self.controller.seek(percent);
                self.report(outcome);
            }
            Command::SetVolume(level) => self.controller.set_volume(level),
        }
    }

    fn start(&mut self) {
        self.cancel_timers();
        self.state = self.state.next();
        self.controller.clear();
        self.aggregator.start();
        self.clock = Some(self.spawn_ticker(|| SessionEvent::ClockTick));
        tracing::info!(generation = self.state.generation, "listening session started");
    }

    fn stop(&mut self) {
        abort(&mut self.clock);
        self.aggregator.stop();
    }

    fn reset(&mut self) {
        self.cancel_timers();
        self.aggregator.reset();
        self.controller.clear();
        self.state = self.state.next();
        tracing::info!(generation = self.state.generation, "session reset");
    }

    fn on_tick(&mut self, tick: EmotionTick) {
        if !self.aggregator.is_active() {
            tracing::trace!(emotion = %tick.emotion, "tick while no session is active");
            return;
        }
        let output = self.state.gate.on_tick(&tick);
        self.aggregator.add_entry(&tick, output.counts_as_change);
        if let Some(trigger) = output.trigger {
            self.request_tracks(trigger);
        }
    }

    fn request_tracks(&mut self, trigger: QueueTrigger) {
        if self.state.fetch_in_flight {
            tracing::debug!(?trigger, "track fetch already in flight; dropping trigger");
            return;
        }
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        self.state.fetch_in_flight = true;

        let generation = self.state.generation;
        let count = self.config.tracks_per_fetch.get();
        let provider = Arc::clone(&self.provider);
        tracing::info!(?trigger, count, "fetching tracks");

        tokio::spawn(async move {
            let result = provider
                .fetch_tracks_for_mood(trigger.emotion(), count)
                .await;
            let _ = tx.send(SessionEvent::TracksFetched {
                generation,
                trigger,
                result,
            });
        });
    }

    fn on_tracks_fetched(
        &mut self,
        generation: u64,
        trigger: QueueTrigger,
        result: Result<Vec<Track>, ProviderError>,
    ) {
        if generation != self.state.generation {
            tracing::debug!(
                generation,
                current = self.state.generation,
                "discarding tracks fetched for a previous session"
            );
            return;
        }
        self.state.fetch_in_flight = false;

        let emotion = trigger.emotion();
        let tracks = match result {
            Ok(tracks) if tracks.is_empty() => {
                tracing::info!(%emotion, "provider returned no tracks");
                self.publish(Notification::NoTracksFound { emotion });
                return;
            }
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!(%emotion, error = %e, "track fetch failed");
                self.publish(Notification::TrackFetchFailed {
                    emotion,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let count = tracks.len();
        match trigger {
            QueueTrigger::Replace(_) => {
                if let Some(token) = self.controller.replace_and_load(tracks) {
                    self.schedule_autoplay(token);
                }
                self.publish(Notification::PlayingForMood { emotion, count });
            }
            QueueTrigger::Append(_) => {
                self.controller.append_to_queue(tracks);
                self.publish(Notification::QueuedForMood { emotion, count });
            }
        }
    }

    fn schedule_autoplay(&mut self, token: AutoplayToken) {
        abort(&mut self.autoplay);
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        let delay = self.config.autoplay_delay.duration();
        self.autoplay = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SessionEvent::AutoplayDue(token));
        }));
    }

    fn spawn_ticker(&self, make: fn() -> SessionEvent) -> JoinHandle<()> {
        let weak = self.self_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLOCK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = weak.upgrade() else {
                    return;
                };
                if tx.send(make()).is_err() {
                    return;
                }
            }
        })
    }

    fn cancel_timers(&mut self) {
        abort(&mut self.clock);
        abort(&mut self.autoplay);
        self.controller.cancel_autoplay();
    }

    fn report(&self, outcome: Result<(), PlaybackError>) {
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "playback failed");
            self.publish(Notification::PlaybackFailed {
                details: e.to_string(),
            });
        }
    }

    fn publish(&self, notification: Notification) {
        if self.notify.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
