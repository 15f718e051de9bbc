use crate::catalog::Track;
use crate::config::PlayerConfig;
use crate::playback::{
    transition, AudioSink, LoadId, PlaybackError, Queue, SignalEffect, SinkEvent, SinkEvents,
    TransportState,
};
use serde::Serialize;
use std::time::Duration;

/// Ticket for one scheduled autoplay. Only the most recently issued token
/// is honoured; replacing or clearing the queue invalidates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoplayToken(u64);

/// Read-only copy of the player for rendering.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlayerView {
    pub transport: TransportState,
    pub current_track: Option<Track>,
    pub queue: Queue,
}

/// Owns the playback queue and transport state, and drives an [`AudioSink`].
pub struct QueueController<S> {
    sink: S,
    queue: Queue,
    loaded: Option<Track>,
    transport: TransportState,
    load_id: LoadId,
    autoplay_seq: u64,
    pending_autoplay: Option<AutoplayToken>,
    resume_on_track_end: bool,
}

impl<S: AudioSink> QueueController<S> {
    pub fn new(mut sink: S, config: &PlayerConfig) -> Self {
        let transport = TransportState::new(config.initial_volume.level());
        sink.set_volume(transport.volume);
        Self {
            sink,
            queue: Queue::new(),
            loaded: None,
            transport,
            load_id: LoadId::default(),
            autoplay_seq: 0,
            pending_autoplay: None,
            resume_on_track_end: config.resume_on_track_end,
        }
    }

    pub fn attach_sink(&mut self, events: SinkEvents) {
        self.sink.attach(events);
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.loaded.as_ref()
    }

    pub fn pending_autoplay(&self) -> Option<AutoplayToken> {
        self.pending_autoplay
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            transport: self.transport,
            current_track: self.loaded.clone(),
            queue: self.queue.clone(),
        }
    }

    /// Stops playback, swaps in `tracks` and loads the first one.
    ///
    /// Returns the token the caller must hand back to [`Self::autoplay_due`]
    /// once the autoplay delay has elapsed.
    pub fn replace_and_load(&mut self, tracks: Vec<Track>) -> Option<AutoplayToken> {
        self.pause();
        self.pending_autoplay = None;
        self.queue.replace(tracks);

        let Some(first) = self.queue.current().cloned() else {
            self.unload();
            return None;
        };
        self.load(first);

        self.autoplay_seq += 1;
        let token = AutoplayToken(self.autoplay_seq);
        self.pending_autoplay = Some(token);
        Some(token)
    }

    /// Queues `tracks` behind the current ones without disturbing playback.
    /// If nothing is loaded yet, the first appended track is loaded.
    pub fn append_to_queue(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let added = tracks.len();
        let first_new = self.queue.extend(tracks);
        tracing::debug!(added, queue_len = self.queue.len(), "appended to queue");

        if self.loaded.is_none() {
            let track = self.queue.select(first_new).clone();
            self.load(track);
        }
    }

    /// Fires a scheduled autoplay if `token` is still the pending one.
    pub fn autoplay_due(&mut self, token: AutoplayToken) -> Result<bool, PlaybackError> {
        if self.pending_autoplay != Some(token) {
            tracing::debug!(?token, "ignoring superseded autoplay");
            return Ok(false);
        }
        self.pending_autoplay = None;
        self.play().map(|()| true)
    }

    pub fn cancel_autoplay(&mut self) {
        self.pending_autoplay = None;
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.loaded.is_none() {
            return Ok(());
        }
        match self.sink.play() {
            Ok(()) => {
                self.transport.is_playing = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "sink refused to play");
                self.transport.is_playing = false;
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) {
        self.sink.pause();
        self.transport.is_playing = false;
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        if self.transport.is_playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn next(&mut self) -> Result<(), PlaybackError> {
        match self.queue.next_index() {
            Some(idx) => self.jump_to(idx),
            None => Ok(()),
        }
    }

    pub fn previous(&mut self) -> Result<(), PlaybackError> {
        match self.queue.previous_index() {
            Some(idx) => self.jump_to(idx),
            None => Ok(()),
        }
    }

    /// Seeks to `percent` of the loaded track; input is clamped to 0..=100.
    pub fn seek(&mut self, percent: f64) -> Result<(), PlaybackError> {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let Some(duration) = self.loaded_duration() else {
            return Ok(());
        };
        self.sink.seek(duration.mul_f64(percent / 100.0))?;
        self.transport.position_percent = percent;
        Ok(())
    }

    pub fn set_volume(&mut self, level: f32) {
        if level.is_nan() {
            return;
        }
        self.transport.volume = level.clamp(0.0, 1.0);
        self.sink.set_volume(self.transport.volume);
    }

    /// Applies a sink signal through the transport transition table.
    pub fn on_sink_event(&mut self, event: SinkEvent) -> Result<(), PlaybackError> {
        if self.loaded.is_none() || event.load_id != self.load_id {
            tracing::debug!(
                load_id = %event.load_id,
                current = %self.load_id,
                signal = event.signal.name(),
                "dropping signal for superseded load"
            );
            return Ok(());
        }

        let (state, effect) = transition(self.transport, &event.signal);
        self.transport = state;
        match effect {
            SignalEffect::None => Ok(()),
            SignalEffect::AdvanceQueue => self.advance_after_end(),
            SignalEffect::ReportFailure { details } => {
                tracing::warn!(load_id = %event.load_id, %details, "playback failed");
                Err(PlaybackError::StreamFailed { details })
            }
        }
    }

    /// Polls the sink for the playback position while playing.
    pub fn refresh_progress(&mut self) {
        if !self.transport.is_playing {
            return;
        }
        if let Some(duration) = self.loaded_duration() {
            let ratio = self.sink.current_time().as_secs_f64() / duration.as_secs_f64();
            self.transport.position_percent = (ratio * 100.0).clamp(0.0, 100.0);
        }
    }

    /// Stops playback and empties the queue.
    pub fn clear(&mut self) {
        self.pause();
        self.pending_autoplay = None;
        self.queue.clear();
        self.unload();
    }

    fn advance_after_end(&mut self) -> Result<(), PlaybackError> {
        // `ended` has already cleared is_playing, so jump_to never resumes here.
        self.next()?;
        if self.resume_on_track_end {
            self.play()?;
        }
        Ok(())
    }

    fn jump_to(&mut self, index: usize) -> Result<(), PlaybackError> {
        let was_playing = self.transport.is_playing;
        let track = self.queue.select(index).clone();
        self.load(track);
        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    fn load(&mut self, track: Track) {
        self.load_id = self.load_id.next();
        tracing::info!(
            load_id = %self.load_id,
            track_id = %track.id,
            title = %track.title,
            "loading track"
        );
        self.sink.load(&track, self.load_id);
        self.loaded = Some(track);
        self.transport.position_percent = 0.0;
        self.transport.is_loading = true;
        self.transport.is_playing = false;
    }

    fn unload(&mut self) {
        self.sink.unload();
        self.loaded = None;
        self.transport.position_percent = 0.0;
        self.transport.is_loading = false;
    }

    fn loaded_duration(&self) -> Option<Duration> {
        let track = self.loaded.as_ref()?;
        self.sink
            .duration()
            .or(Some(track.duration))
            .filter(|d| !d.is_zero())
    }
}
