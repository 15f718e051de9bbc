use crate::catalog::Track;
use crate::playback::{AudioSink, LoadId, PlaybackError, SinkEvents, SinkSignal};
use reqwest::Client;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

const END_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Value of `active_load` while nothing is loaded. Real loads start at 1.
const NO_LOAD: u64 = 0;

/// Plays track streams on the default output device.
///
/// Each load downloads the whole stream, decodes it with Rodio and then
/// watches the sink until it drains to report `ended`. The
/// [`OutputStream`] is kept alive for as long as the sink exists.
pub struct RodioAudioSink {
    _stream: OutputStream,
    sink: Arc<Sink>,
    client: Client,
    events: Option<SinkEvents>,
    active_load: Arc<AtomicU64>,
    duration: Arc<Mutex<Option<Duration>>>,
    worker: Option<JoinHandle<()>>,
}

impl RodioAudioSink {
    pub fn new() -> Result<Self, PlaybackError> {
        let stream = OutputStreamBuilder::open_default_stream().map_err(|e| {
            PlaybackError::AudioOutputUnavailable {
                details: format!("open default output stream: {e}"),
            }
        })?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| PlaybackError::StreamFailed {
                details: format!("http client: {e}"),
            })?;

        Ok(Self {
            _stream: stream,
            sink: Arc::new(sink),
            client,
            events: None,
            active_load: Arc::new(AtomicU64::new(NO_LOAD)),
            duration: Arc::new(Mutex::new(None)),
            worker: None,
        })
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }

    fn set_duration(slot: &Mutex<Option<Duration>>, value: Option<Duration>) {
        match slot.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

async fn fetch_and_decode(
    client: &Client,
    uri: &str,
) -> Result<Decoder<Cursor<Vec<u8>>>, String> {
    let response = client
        .get(uri)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| format!("download failed: {e}"))?;
    let body = response
        .bytes()
        .await
        .map_err(|e| format!("download interrupted: {e}"))?;
    Decoder::new(Cursor::new(body.to_vec())).map_err(|e| format!("decode failed: {e}"))
}

impl AudioSink for RodioAudioSink {
    fn attach(&mut self, events: SinkEvents) {
        self.events = Some(events);
    }

    fn load(&mut self, track: &Track, load_id: LoadId) {
        self.stop_worker();
        self.sink.clear();
        self.active_load.store(load_id.0, Ordering::SeqCst);
        Self::set_duration(&self.duration, None);

        let Some(events) = self.events.clone() else {
            tracing::warn!(%load_id, "rodio sink has no event listener; skipping load");
            return;
        };
        events.emit(load_id, SinkSignal::LoadStart);

        let client = self.client.clone();
        let sink = Arc::clone(&self.sink);
        let active = Arc::clone(&self.active_load);
        let duration = Arc::clone(&self.duration);
        let uri = track.stream_uri.clone();
        let advertised = track.duration;

        self.worker = Some(tokio::spawn(async move {
            let is_current = |active: &AtomicU64| active.load(Ordering::SeqCst) == load_id.0;

            let source = match fetch_and_decode(&client, &uri).await {
                Ok(source) => source,
                Err(details) => {
                    if is_current(&active) {
                        events.emit(load_id, SinkSignal::Error { details });
                    }
                    return;
                }
            };
            if !is_current(&active) {
                return;
            }

            let length = source
                .total_duration()
                .or(Some(advertised))
                .filter(|d| !d.is_zero());
            Self::set_duration(&duration, length);
            sink.append(source);
            events.emit(load_id, SinkSignal::CanPlay);

            loop {
                tokio::time::sleep(END_POLL_INTERVAL).await;
                if !is_current(&active) {
                    return;
                }
                if sink.empty() {
                    events.emit(load_id, SinkSignal::Ended);
                    return;
                }
            }
        }));
    }

    fn unload(&mut self) {
        self.stop_worker();
        self.active_load.store(NO_LOAD, Ordering::SeqCst);
        self.sink.clear();
        Self::set_duration(&self.duration, None);
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        self.sink
            .try_seek(position)
            .map_err(|e| PlaybackError::SeekFailed {
                details: e.to_string(),
            })
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn current_time(&self) -> Duration {
        self.sink.get_pos()
    }

    fn duration(&self) -> Option<Duration> {
        match self.duration.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Drop for RodioAudioSink {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
