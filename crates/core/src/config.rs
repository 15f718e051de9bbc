use serde::Serialize;
use std::time::Duration;
use url::Url;

pub const DEFAULT_AUDIUS_BASE_URL: &str = "https://discoveryprovider.audius.co";
pub const DEFAULT_TRACKS_PER_FETCH: usize = 3;
pub const DEFAULT_AUTOPLAY_DELAY_MS: u64 = 1000;
pub const DEFAULT_VOLUME: f32 = 0.7;
pub const ENV_AUDIUS_BASE_URL: &str = "MOODBEAT_AUDIUS_URL";
pub const ENV_AUDIUS_APP_NAME: &str = "MOODBEAT_AUDIUS_APP_NAME";

/// Granularity of the session clock and of progress polling.
pub const CLOCK_INTERVAL: Duration = Duration::from_secs(1);

const MAX_TRACKS_PER_FETCH: usize = 50;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct AutoplayDelay {
    delay_ms: u64,
}

impl AutoplayDelay {
    pub fn new(delay_ms: u64) -> Result<Self, ConfigError> {
        if delay_ms == 0 {
            return Err(ConfigError::ZeroAutoplayDelay);
        }
        Ok(Self { delay_ms })
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for AutoplayDelay {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_AUTOPLAY_DELAY_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct Volume(f32);

impl Volume {
    pub fn new(level: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&level) {
            return Err(ConfigError::VolumeOutOfRange(level));
        }
        Ok(Self(level))
    }

    pub fn level(&self) -> f32 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME)
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct TracksPerFetch(usize);

impl TracksPerFetch {
    pub fn new(count: usize) -> Result<Self, ConfigError> {
        if count == 0 || count > MAX_TRACKS_PER_FETCH {
            return Err(ConfigError::TracksPerFetchOutOfRange(count));
        }
        Ok(Self(count))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for TracksPerFetch {
    fn default() -> Self {
        Self(DEFAULT_TRACKS_PER_FETCH)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: Url,
    pub app_name: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_AUDIUS_BASE_URL).expect("default audius url is valid"),
            app_name: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlayerConfig {
    pub autoplay_delay: AutoplayDelay,
    pub initial_volume: Volume,
    pub tracks_per_fetch: TracksPerFetch,
    /// Whether advancing past a finished track keeps playing.
    pub resume_on_track_end: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay_delay: AutoplayDelay::default(),
            initial_volume: Volume::default(),
            tracks_per_fetch: TracksPerFetch::default(),
            resume_on_track_end: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub player: PlayerConfig,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("autoplay delay must be > 0 ms")]
    ZeroAutoplayDelay,
    #[error("volume must be within 0.0..=1.0, got {0}")]
    VolumeOutOfRange(f32),
    #[error("tracks per fetch must be within 1..=50, got {0}")]
    TracksPerFetchOutOfRange(usize),
    #[error("invalid provider url {url:?}: {reason}")]
    InvalidProviderUrl { url: String, reason: String },
}

pub fn parse_provider_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidProviderUrl {
        url: value.to_owned(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidProviderUrl {
            url: value.to_owned(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    cli_value
        .or_else(|| env.var(env_key))
        .unwrap_or_else(|| default.to_owned())
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    cli_value
        .or_else(|| env.var(env_key))
        .filter(|v| !v.trim().is_empty())
}

pub fn resolve_provider_config(
    cli_url: Option<String>,
    cli_app_name: Option<String>,
    env: &impl Env,
) -> Result<ProviderConfig, ConfigError> {
    let url =
        resolve_string_with_default(cli_url, ENV_AUDIUS_BASE_URL, env, DEFAULT_AUDIUS_BASE_URL);
    Ok(ProviderConfig {
        base_url: parse_provider_url(&url)?,
        app_name: resolve_optional_string(cli_app_name, ENV_AUDIUS_APP_NAME, env),
    })
}
