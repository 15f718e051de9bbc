use crate::catalog::{MoodGenres, ProviderError, Track, TrackProvider};
use crate::emotion::Emotion;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Network-free catalog: synthesizes tracks from the mood's genre keywords.
///
/// Every fetch is numbered, so ids stay unique across repeated fetches for
/// the same mood.
#[derive(Debug)]
pub struct OfflineTrackProvider {
    track_length: Duration,
    fetches: AtomicU64,
}

impl OfflineTrackProvider {
    pub fn new() -> Self {
        Self {
            track_length: Duration::from_secs(180),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn with_track_length(mut self, length: Duration) -> Self {
        self.track_length = length;
        self
    }

    fn tracks_for(&self, emotion: Emotion, count: usize) -> Vec<Track> {
        let fetch = self.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        let genres = MoodGenres::keywords(emotion);
        (0..count)
            .map(|n| {
                let genre = genres[n % genres.len()];
                let id = format!("{emotion}-f{fetch}-{n}");
                Track {
                    title: format!("{} #{}", genre, n + 1),
                    artist: format!("Offline {emotion}"),
                    artwork_uri: None,
                    stream_uri: format!("offline://{id}"),
                    duration: self.track_length,
                    id,
                }
            })
            .collect()
    }
}

impl Default for OfflineTrackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackProvider for OfflineTrackProvider {
    fn fetch_tracks_for_mood(
        &self,
        emotion: Emotion,
        count: usize,
    ) -> BoxFuture<'_, Result<Vec<Track>, ProviderError>> {
        let tracks = self.tracks_for(emotion, count);
        async move { Ok(tracks) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fetch(provider: &OfflineTrackProvider, emotion: Emotion, count: usize) -> Vec<Track> {
        futures::executor::block_on(provider.fetch_tracks_for_mood(emotion, count))
            .expect("offline never fails")
    }

    #[test]
    fn produces_requested_count() {
        let provider = OfflineTrackProvider::new().with_track_length(Duration::from_secs(42));
        let tracks = fetch(&provider, Emotion::Sad, 5);
        assert_eq!(tracks.len(), 5);
        assert_eq!(tracks[0].id, "sad-f1-0");
        assert_eq!(tracks[4].title, "sad #5");
        assert!(tracks.iter().all(|t| t.duration == Duration::from_secs(42)));
    }

    #[test]
    fn repeated_fetches_for_one_mood_never_reuse_ids() {
        let provider = OfflineTrackProvider::new();
        let mut ids = HashSet::new();
        for emotion in [Emotion::Happy, Emotion::Sad, Emotion::Happy] {
            for track in fetch(&provider, emotion, 3) {
                assert!(ids.insert(track.id.clone()), "duplicate id {}", track.id);
            }
        }
        assert_eq!(ids.len(), 9);
    }
}
