use crate::catalog::{MoodGenres, ProviderError, Track, TrackProvider};
use crate::config::ProviderConfig;
use crate::emotion::Emotion;
use crate::util::{retry_with_backoff, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Number of genre keywords searched per mood.
const SEARCHES_PER_MOOD: usize = 2;

/// Track search backed by an Audius discovery node.
#[derive(Clone)]
pub struct AudiusTrackProvider {
    client: Client,
    base: String,
    app_name: Option<String>,
    retry: RetryConfig,
}

#[derive(Deserialize)]
struct AudiusSearchResponse {
    data: Vec<AudiusTrack>,
}

#[derive(Deserialize)]
struct AudiusTrack {
    id: String,
    title: String,
    user: AudiusUser,
    #[serde(default)]
    artwork: Option<AudiusArtwork>,
    #[serde(default)]
    duration: u64,
}

#[derive(Deserialize)]
struct AudiusUser {
    name: String,
}

#[derive(Deserialize)]
struct AudiusArtwork {
    #[serde(rename = "480x480")]
    medium: Option<String>,
}

impl AudiusTrackProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base: config.base_url.as_str().trim_end_matches('/').to_owned(),
            app_name: config.app_name.clone(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn search_url(&self, keyword: &str, limit: usize) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/v1/tracks/search", self.base))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("query", keyword)
                .append_pair("limit", &limit.to_string());
            if let Some(app) = &self.app_name {
                query.append_pair("app_name", app);
            }
        }
        Ok(url)
    }

    fn stream_uri(&self, track_id: &str) -> String {
        format!("{}/v1/tracks/{}/stream", self.base, track_id)
    }

    fn to_track(&self, raw: AudiusTrack) -> Track {
        Track {
            stream_uri: self.stream_uri(&raw.id),
            id: raw.id,
            title: raw.title,
            artist: raw.user.name,
            artwork_uri: raw.artwork.and_then(|a| a.medium),
            duration: Duration::from_secs(raw.duration),
        }
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Track>, ProviderError> {
        let url = self.search_url(keyword, limit)?;
        tracing::debug!(keyword, limit, "searching audius");

        let raw = retry_with_backoff(
            &self.retry,
            || self.search_once(url.clone()),
            ProviderError::is_retryable,
        )
        .await?;

        Ok(raw.into_iter().map(|t| self.to_track(t)).collect())
    }

    async fn search_once(&self, url: Url) -> Result<Vec<AudiusTrack>, ProviderError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }
}

fn parse_search_response(body: &str) -> Result<Vec<AudiusTrack>, ProviderError> {
    serde_json::from_str::<AudiusSearchResponse>(body)
        .map(|r| r.data)
        .map_err(|e| ProviderError::Decode(format!("failed to parse search response: {e}")))
}

/// Flattens per-keyword results, keeping the first occurrence of each track id.
fn merge_batches(batches: Vec<Vec<Track>>) -> Vec<Track> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

impl TrackProvider for AudiusTrackProvider {
    fn fetch_tracks_for_mood(
        &self,
        emotion: Emotion,
        count: usize,
    ) -> BoxFuture<'_, Result<Vec<Track>, ProviderError>> {
        async move {
            if count == 0 {
                return Ok(Vec::new());
            }
            let per_search = count.div_ceil(SEARCHES_PER_MOOD);
            let searches = MoodGenres::keywords(emotion)
                .iter()
                .take(SEARCHES_PER_MOOD)
                .map(|kw| self.search(kw, per_search));

            let batches = futures::future::try_join_all(searches).await?;
            let mut tracks = merge_batches(batches);
            tracks.shuffle(&mut rand::rng());
            tracks.truncate(count);

            tracing::info!(emotion = %emotion, found = tracks.len(), "fetched tracks");
            Ok(tracks)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn provider(base: &str, app_name: Option<&str>) -> AudiusTrackProvider {
        let config = ProviderConfig {
            base_url: Url::parse(base).expect("valid url"),
            app_name: app_name.map(str::to_owned),
        };
        AudiusTrackProvider::new(&config).expect("client builds")
    }

    #[test]
    fn search_url_encodes_keyword_and_limit() {
        let p = provider("https://discovery.example.org/", None);
        let url = p.search_url("feel good", 2).expect("url");
        assert_eq!(
            url.as_str(),
            "https://discovery.example.org/v1/tracks/search?query=feel+good&limit=2"
        );
    }

    #[test]
    fn search_url_carries_app_name_when_configured() {
        let p = provider("https://discovery.example.org", Some("moodbeat"));
        let url = p.search_url("pop", 1).expect("url");
        assert!(url.as_str().ends_with("&app_name=moodbeat"));
    }

    #[test]
    fn response_maps_to_tracks() {
        let p = provider("https://discovery.example.org", None);
        let body = r#"{"data":[
            {"id":"D7a","title":"Sunny","user":{"name":"Ray"},
             "artwork":{"150x150":"s","480x480":"https://img/480"},"duration":187},
            {"id":"Q2","title":"Rain","user":{"name":"Mo"}}
        ]}"#;
        let tracks: Vec<Track> = parse_search_response(body)
            .expect("valid body")
            .into_iter()
            .map(|t| p.to_track(t))
            .collect();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Ray");
        assert_eq!(tracks[0].artwork_uri.as_deref(), Some("https://img/480"));
        assert_eq!(
            tracks[0].stream_uri,
            "https://discovery.example.org/v1/tracks/D7a/stream"
        );
        assert_eq!(tracks[0].duration, Duration::from_secs(187));
        assert_eq!(tracks[1].artwork_uri, None);
        assert_eq!(tracks[1].duration, Duration::ZERO);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(
            parse_search_response("{\"tracks\":[]}"),
            Err(ProviderError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn zero_count_skips_the_network() {
        let p = provider("http://127.0.0.1:9", None);
        let tracks = p
            .fetch_tracks_for_mood(Emotion::Happy, 0)
            .await
            .expect("no request made");
        assert!(tracks.is_empty());
    }

    #[test]
    fn overlapping_keyword_results_are_merged_by_id() {
        let p = provider("https://discovery.example.org", None);
        let track = |id: &str| {
            p.to_track(AudiusTrack {
                id: id.to_owned(),
                title: format!("title {id}"),
                user: AudiusUser {
                    name: "Ray".to_owned(),
                },
                artwork: None,
                duration: 200,
            })
        };
        let merged = merge_batches(vec![
            vec![track("a"), track("b")],
            vec![track("b"), track("c")],
        ]);
        let ids: Vec<_> = merged.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn unreachable_node_fails_once_without_retry() {
        let p = provider("http://127.0.0.1:9", None).with_retry(RetryConfig::none());
        assert!(matches!(
            p.search("pop", 1).await,
            Err(ProviderError::Http(_))
        ));
    }

    /// Answers every request with `503` and counts them.
    async fn unavailable_node() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\n\
                          content-length: 4\r\nconnection: close\r\n\r\nbusy",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn error_status_is_retried_then_reported_with_body() {
        let (base, hits) = unavailable_node().await;
        let p = provider(&base, None).with_retry(RetryConfig::new(2, Duration::from_millis(1)));

        let err = p.search("pop", 1).await.expect_err("node is down");
        assert!(matches!(
            &err,
            ProviderError::Status { status: 503, body } if body == "busy"
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let single = provider(&base, None).with_retry(RetryConfig::none());
        assert!(single.search("pop", 1).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
