use crate::catalog::Track;
use crate::playback::{AudioSink, LoadId, PlaybackError, SinkEvents, SinkSignal};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Sink without an output device. Loads are ready immediately and the
/// position advances with the tokio clock while "playing". When a runtime
/// is available, `ended` is reported once the position reaches the end.
#[derive(Debug, Default)]
pub struct DummyAudioSink {
    events: Option<SinkEvents>,
    loaded: Option<(LoadId, Duration)>,
    offset: Duration,
    playing_since: Option<Instant>,
    volume: f32,
    end_timer: Option<JoinHandle<()>>,
}

impl DummyAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn emit(&self, load_id: LoadId, signal: SinkSignal) {
        if let Some(events) = &self.events {
            events.emit(load_id, signal);
        }
    }

    fn length(&self) -> Option<Duration> {
        self.loaded.map(|(_, length)| length)
    }

    fn cancel_end_timer(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }

    fn schedule_end(&mut self) {
        self.cancel_end_timer();
        let (Some((load_id, length)), Some(events)) = (self.loaded, self.events.clone()) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let remaining = length.saturating_sub(self.current_time());
        self.end_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(remaining).await;
            events.emit(load_id, SinkSignal::Ended);
        }));
    }
}

impl Drop for DummyAudioSink {
    fn drop(&mut self) {
        self.cancel_end_timer();
    }
}

impl AudioSink for DummyAudioSink {
    fn attach(&mut self, events: SinkEvents) {
        self.events = Some(events);
    }

    fn load(&mut self, track: &Track, load_id: LoadId) {
        self.cancel_end_timer();
        self.loaded = Some((load_id, track.duration));
        self.offset = Duration::ZERO;
        self.playing_since = None;
        self.emit(load_id, SinkSignal::LoadStart);
        self.emit(load_id, SinkSignal::CanPlay);
    }

    fn unload(&mut self) {
        self.cancel_end_timer();
        self.loaded = None;
        self.offset = Duration::ZERO;
        self.playing_since = None;
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.loaded.is_some() && self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
            self.schedule_end();
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.cancel_end_timer();
        self.offset = self.current_time();
        self.playing_since = None;
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        self.offset = match self.length() {
            Some(length) => position.min(length),
            None => Duration::ZERO,
        };
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
            self.schedule_end();
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn current_time(&self) -> Duration {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        let position = self.offset + elapsed;
        match self.length() {
            Some(length) => position.min(length),
            None => Duration::ZERO,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.length().filter(|d| !d.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::track;
    use crate::playback::SinkEvent;
    use std::sync::{Arc, Mutex};

    #[test]
    fn load_reports_loadstart_then_canplay() {
        let seen: Arc<Mutex<Vec<SinkEvent>>> = Arc::default();
        let mut sink = DummyAudioSink::new();
        sink.attach(SinkEvents::new({
            let seen = Arc::clone(&seen);
            move |ev| seen.lock().expect("lock").push(ev)
        }));

        sink.load(&track("a", 30), LoadId(7));

        let seen = seen.lock().expect("lock");
        let signals: Vec<_> = seen.iter().map(|e| (e.load_id, e.signal.name())).collect();
        assert_eq!(
            signals,
            vec![(LoadId(7), "loadstart"), (LoadId(7), "canplay")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn position_advances_only_while_playing() {
        let mut sink = DummyAudioSink::new();
        sink.load(&track("a", 30), LoadId(1));
        sink.play().expect("play");

        tokio::time::advance(Duration::from_secs(10)).await;
        sink.pause();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(sink.current_time(), Duration::from_secs(10));

        sink.seek(Duration::from_secs(25)).expect("seek");
        sink.play().expect("play");
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(sink.current_time(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn ended_fires_when_playback_reaches_the_end() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = DummyAudioSink::new();
        sink.attach(SinkEvents::new(move |ev| {
            let _ = tx.send(ev);
        }));
        sink.load(&track("a", 20), LoadId(3));
        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.signal, SinkSignal::Ended);
        }

        sink.play().expect("play");
        tokio::time::sleep(Duration::from_secs(5)).await;
        sink.pause();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err(), "paused sink must not end");

        sink.play().expect("play");
        let ev = rx.recv().await.expect("ended");
        assert_eq!(ev.load_id, LoadId(3));
        assert_eq!(ev.signal, SinkSignal::Ended);
        assert_eq!(sink.current_time(), Duration::from_secs(20));
    }
}
