mod audius;
mod offline;

use crate::emotion::Emotion;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use audius::AudiusTrackProvider;
pub use offline::OfflineTrackProvider;

/// A playable track as returned by a provider. Immutable once fetched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artwork_uri: Option<String>,
    pub stream_uri: String,
    pub duration: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid provider response: {0}")]
    Decode(String),

    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Status { status, .. } => crate::util::is_http_retryable(*status),
            ProviderError::Decode(_) | ProviderError::InvalidUrl(_) => false,
        }
    }
}

/// Maps a mood to candidate tracks. May legitimately return nothing.
pub trait TrackProvider: Send + Sync {
    fn fetch_tracks_for_mood(
        &self,
        emotion: Emotion,
        count: usize,
    ) -> BoxFuture<'_, Result<Vec<Track>, ProviderError>>;
}

/// Static mood to genre-keyword table.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoodGenres;

impl MoodGenres {
    pub fn keywords(emotion: Emotion) -> &'static [&'static str] {
        match emotion {
            Emotion::Neutral => &["chill", "ambient", "soft pop", "indie"],
            Emotion::Happy => &["pop", "upbeat", "dance", "feel good"],
            Emotion::Sad => &["sad", "melancholy", "emotional", "acoustic"],
            Emotion::Angry => &["rock", "metal", "intense", "aggressive"],
            Emotion::Surprised => &["electronic", "experimental", "energetic"],
            Emotion::Fearful => &["dark ambient", "cinematic", "atmospheric"],
            Emotion::Disgusted => &["alternative", "grunge", "punk"],
        }
    }
}
