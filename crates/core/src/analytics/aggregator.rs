use crate::analytics::{LogEntry, SessionSnapshot};
use crate::emotion::EmotionTick;
use std::time::SystemTime;
use tokio::time::Instant;

/// Accumulates the statistics of the running session.
///
/// The owner drives the clock by calling [`Self::refresh_duration`] about
/// once a second while the session is active.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    snapshot: SessionSnapshot,
    active: bool,
    clock_origin: Option<Instant>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) {
        self.snapshot = SessionSnapshot {
            started_at: Some(SystemTime::now()),
            ..SessionSnapshot::default()
        };
        self.active = true;
        self.clock_origin = Some(Instant::now());
        tracing::info!("session started");
    }

    /// Freezes the clock. Accumulated data is kept until [`Self::reset`].
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.refresh_duration();
        self.active = false;
        self.clock_origin = None;
        tracing::info!(
            duration_ms = self.snapshot.duration.as_millis() as u64,
            entries = self.snapshot.log.len(),
            changes = self.snapshot.change_count,
            "session stopped"
        );
    }

    pub fn reset(&mut self) {
        self.stop();
        self.snapshot = SessionSnapshot::default();
    }

    /// Records one classifier tick. Dropped when the session is not active.
    pub fn add_entry(&mut self, tick: &EmotionTick, counts_as_change: bool) -> bool {
        if !self.active {
            tracing::trace!(emotion = %tick.emotion, "dropping entry for inactive session");
            return false;
        }
        self.snapshot.log.push(LogEntry {
            emotion: tick.emotion,
            confidence: tick.confidence,
            timestamp: tick.timestamp,
        });
        self.snapshot.histogram.record(tick.emotion);
        if counts_as_change {
            self.snapshot.change_count += 1;
        }
        true
    }

    pub fn refresh_duration(&mut self) {
        if let (true, Some(origin)) = (self.active, self.clock_origin) {
            self.snapshot.duration = origin.elapsed();
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::{tick, Emotion};
    use std::time::Duration;

    #[test]
    fn entries_are_dropped_while_inactive() {
        let mut agg = SessionAggregator::new();
        assert!(!agg.add_entry(&tick(Emotion::Happy, 90), false));
        assert!(agg.snapshot().log.is_empty());
    }

    #[test]
    fn every_entry_counts_regardless_of_confidence() {
        let mut agg = SessionAggregator::new();
        agg.start();
        for c in [5, 40, 50, 99] {
            agg.add_entry(&tick(Emotion::Sad, c), false);
        }
        agg.add_entry(&tick(Emotion::Happy, 70), true);

        let snap = agg.snapshot();
        assert_eq!(snap.histogram.total() as usize, snap.log.len());
        assert_eq!(snap.histogram.get(Emotion::Sad), 4);
        assert_eq!(snap.change_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_freezes_duration_but_keeps_data() {
        let mut agg = SessionAggregator::new();
        agg.start();
        agg.add_entry(&tick(Emotion::Neutral, 80), false);

        tokio::time::advance(Duration::from_secs(3)).await;
        agg.refresh_duration();
        assert_eq!(agg.snapshot().duration, Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(2)).await;
        agg.stop();
        tokio::time::advance(Duration::from_secs(10)).await;
        agg.refresh_duration();

        let snap = agg.snapshot();
        assert_eq!(snap.duration, Duration::from_secs(5));
        assert_eq!(snap.log.len(), 1);
        assert!(!agg.is_active());
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut agg = SessionAggregator::new();
        agg.start();
        agg.add_entry(&tick(Emotion::Angry, 80), true);
        agg.reset();
        assert_eq!(agg.snapshot(), SessionSnapshot::default());
        assert!(!agg.is_active());
    }

    #[test]
    fn restart_discards_previous_session() {
        let mut agg = SessionAggregator::new();
        agg.start();
        agg.add_entry(&tick(Emotion::Angry, 80), false);
        agg.stop();
        agg.start();
        let snap = agg.snapshot();
        assert!(snap.log.is_empty());
        assert!(snap.started_at.is_some());
    }
}
