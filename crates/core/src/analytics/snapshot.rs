use crate::emotion::{Confidence, Emotion};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::{Duration, SystemTime};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LogEntry {
    pub emotion: Emotion,
    pub confidence: Confidence,
    pub timestamp: SystemTime,
}

/// Per-emotion occurrence counts, kept in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<(Emotion, u32)>,
}

impl Histogram {
    pub fn record(&mut self, emotion: Emotion) {
        match self.counts.iter_mut().find(|(e, _)| *e == emotion) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((emotion, 1)),
        }
    }

    pub fn get(&self, emotion: Emotion) -> u32 {
        self.counts
            .iter()
            .find(|(e, _)| *e == emotion)
            .map_or(0, |(_, c)| *c)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u32)> + '_ {
        self.counts.iter().copied()
    }
}

impl FromIterator<(Emotion, u32)> for Histogram {
    fn from_iter<I: IntoIterator<Item = (Emotion, u32)>>(iter: I) -> Self {
        let mut histogram = Histogram::default();
        for (emotion, count) in iter {
            match histogram.counts.iter_mut().find(|(e, _)| *e == emotion) {
                Some((_, c)) => *c += count,
                None => histogram.counts.push((emotion, count)),
            }
        }
        histogram
    }
}

impl Serialize for Histogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (emotion, count) in &self.counts {
            map.serialize_entry(emotion, count)?;
        }
        map.end()
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct EmotionShare {
    pub emotion: Emotion,
    pub count: u32,
    pub percentage: f64,
}

/// Point-in-time copy of a session's accumulated statistics.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub started_at: Option<SystemTime>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub log: Vec<LogEntry>,
    pub histogram: Histogram,
    pub change_count: u32,
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl SessionSnapshot {
    pub fn minutes(&self) -> f64 {
        self.duration.as_secs_f64() / 60.0
    }

    /// Share of every recorded emotion, in histogram order.
    pub fn shares(&self) -> Vec<EmotionShare> {
        let total = self.histogram.total();
        self.histogram
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(emotion, count)| EmotionShare {
                emotion,
                count,
                percentage: f64::from(count) / f64::from(total) * 100.0,
            })
            .collect()
    }

    /// Shares sorted by percentage, highest first. Ties keep histogram order.
    pub fn breakdown(&self) -> Vec<EmotionShare> {
        let mut shares = self.shares();
        shares.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        shares
    }

    pub fn dominant(&self) -> Option<EmotionShare> {
        self.breakdown().into_iter().next()
    }
}

/// Renders elapsed time as `1h 2m 3s`, `2m 5s` or `42s`.
pub fn format_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_keeps_first_seen_order() {
        let mut h = Histogram::default();
        for e in [Emotion::Sad, Emotion::Happy, Emotion::Sad, Emotion::Neutral] {
            h.record(e);
        }
        let entries: Vec<_> = h.iter().collect();
        assert_eq!(
            entries,
            vec![(Emotion::Sad, 2), (Emotion::Happy, 1), (Emotion::Neutral, 1)]
        );
        assert_eq!(h.total(), 4);
        assert_eq!(h.get(Emotion::Angry), 0);
    }

    #[test]
    fn histogram_serializes_as_ordered_map() {
        let h: Histogram = [(Emotion::Sad, 3), (Emotion::Happy, 7)].into_iter().collect();
        let json = serde_json::to_string(&h).expect("serialize");
        assert_eq!(json, r#"{"sad":3,"happy":7}"#);
    }

    #[test]
    fn breakdown_is_sorted_and_stable_on_ties() {
        let snapshot = SessionSnapshot {
            histogram: [(Emotion::Angry, 2), (Emotion::Happy, 5), (Emotion::Sad, 2)]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let order: Vec<_> = snapshot.breakdown().iter().map(|s| s.emotion).collect();
        assert_eq!(order, vec![Emotion::Happy, Emotion::Angry, Emotion::Sad]);
        let dominant = snapshot.dominant().expect("non-empty");
        assert!((dominant.percentage - 5.0 / 9.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_has_no_dominant_emotion() {
        assert_eq!(SessionSnapshot::default().dominant(), None);
        assert!(SessionSnapshot::default().shares().is_empty());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_millis(42_900)), "42s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }

    #[test]
    fn snapshot_reports_duration_in_millis() {
        let snapshot = SessionSnapshot {
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let value = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(value["duration_ms"], 1500);
        assert_eq!(value["change_count"], 0);
    }
}
