mod feed;
mod gate;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::SystemTime};

pub use feed::{parse_tick_line, parse_ticks, FeedError, TickRecord};
pub use gate::{
    EmotionGate, GateOutput, QueueTrigger, QUEUE_CONFIDENCE_THRESHOLD,
    STATS_CONFIDENCE_THRESHOLD,
};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

/// Coarse polarity of an emotion, used when classifying a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Valence {
    Positive,
    Negative,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }

    pub fn valence(&self) -> Valence {
        match self {
            Emotion::Happy | Emotion::Surprised => Valence::Positive,
            Emotion::Sad | Emotion::Angry | Emotion::Fearful | Emotion::Disgusted => {
                Valence::Negative
            }
            Emotion::Neutral => Valence::Neutral,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EmotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| EmotionError::UnknownEmotion(s.to_owned()))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmotionError {
    #[error("unknown emotion: {0:?}")]
    UnknownEmotion(String),
    #[error("confidence must be within 0..=100, got {0}")]
    ConfidenceOutOfRange(u32),
}

/// Classifier confidence as a whole percentage.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Confidence(u8);

impl Confidence {
    pub fn new(percent: u32) -> Result<Self, EmotionError> {
        match u8::try_from(percent) {
            Ok(p) if p <= 100 => Ok(Self(p)),
            _ => Err(EmotionError::ConfidenceOutOfRange(percent)),
        }
    }

    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// One classification produced by the external classifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmotionTick {
    pub emotion: Emotion,
    pub confidence: Confidence,
    pub timestamp: SystemTime,
}

impl EmotionTick {
    pub fn new(emotion: Emotion, confidence: Confidence) -> Self {
        Self {
            emotion,
            confidence,
            timestamp: SystemTime::now(),
        }
    }

    pub fn at(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
pub(crate) fn tick(emotion: Emotion, confidence: u32) -> EmotionTick {
    EmotionTick::new(emotion, Confidence::new(confidence).expect("valid confidence"))
}
