//! JSON-lines replay of classifier output.
//!
//! Each non-empty line is one tick, e.g.
//! `{"emotion": "happy", "confidence": 80, "timestamp_ms": 1700000000000}`.
//! `timestamp_ms` is optional. Lines starting with `#` are comments.

use crate::emotion::{Confidence, Emotion, EmotionError, EmotionTick};
use serde::Deserialize;
use std::io::BufRead;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("failed to read tick feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid tick record: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Invalid {
        line: usize,
        #[source]
        source: EmotionError,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TickRecord {
    pub emotion: Emotion,
    pub confidence: u32,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

impl TickRecord {
    pub fn into_tick(self) -> Result<EmotionTick, EmotionError> {
        let confidence = Confidence::new(self.confidence)?;
        let tick = EmotionTick::new(self.emotion, confidence);
        Ok(match self.timestamp_ms {
            Some(ms) => tick.at(UNIX_EPOCH + Duration::from_millis(ms)),
            None => tick.at(SystemTime::now()),
        })
    }
}

/// Parses one feed line. Blank lines and comments yield `Ok(None)`.
pub fn parse_tick_line(line: &str, line_no: usize) -> Result<Option<EmotionTick>, FeedError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let record: TickRecord = serde_json::from_str(trimmed).map_err(|source| FeedError::Json {
        line: line_no,
        source,
    })?;
    record
        .into_tick()
        .map(Some)
        .map_err(|source| FeedError::Invalid {
            line: line_no,
            source,
        })
}

pub fn parse_ticks<R: BufRead>(reader: R) -> Result<Vec<EmotionTick>, FeedError> {
    let mut ticks = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        if let Some(tick) = parse_tick_line(&line?, idx + 1)? {
            ticks.push(tick);
        }
    }
    tracing::debug!(count = ticks.len(), "parsed tick feed");
    Ok(ticks)
}
