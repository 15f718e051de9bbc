use crate::emotion::{Emotion, EmotionTick};

/// Ticks below this confidence never touch the playback queue.
pub const QUEUE_CONFIDENCE_THRESHOLD: u8 = 60;
/// Ticks must exceed this confidence to count as a mood change in the stats.
pub const STATS_CONFIDENCE_THRESHOLD: u8 = 50;

/// What the playback queue should do in response to an accepted tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueTrigger {
    /// First accepted emotion of the session: start over with fresh tracks.
    Replace(Emotion),
    /// The accepted emotion changed: queue tracks behind the current ones.
    Append(Emotion),
}

impl QueueTrigger {
    pub fn emotion(&self) -> Emotion {
        match self {
            QueueTrigger::Replace(e) | QueueTrigger::Append(e) => *e,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateOutput {
    pub trigger: Option<QueueTrigger>,
    pub counts_as_change: bool,
}

/// Debounces raw classifier ticks for the queue and the session stats.
///
/// The two consumers keep independent "last accepted" slots with different
/// thresholds. A fresh gate is built for every session.
#[derive(Clone, Debug, Default)]
pub struct EmotionGate {
    last_for_queue: Option<Emotion>,
    last_for_stats: Option<Emotion>,
}

impl EmotionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, tick: &EmotionTick) -> GateOutput {
        GateOutput {
            counts_as_change: self.stats_branch(tick),
            trigger: self.queue_branch(tick),
        }
    }

    /// Last emotion accepted for the queue, if any.
    pub fn current_emotion(&self) -> Option<Emotion> {
        self.last_for_queue
    }

    fn stats_branch(&mut self, tick: &EmotionTick) -> bool {
        if tick.confidence.percent() <= STATS_CONFIDENCE_THRESHOLD {
            return false;
        }
        let changed = matches!(self.last_for_stats, Some(prev) if prev != tick.emotion);
        self.last_for_stats = Some(tick.emotion);
        changed
    }

    fn queue_branch(&mut self, tick: &EmotionTick) -> Option<QueueTrigger> {
        if tick.confidence.percent() < QUEUE_CONFIDENCE_THRESHOLD {
            return None;
        }
        let trigger = match self.last_for_queue {
            None => Some(QueueTrigger::Replace(tick.emotion)),
            Some(prev) if prev != tick.emotion => Some(QueueTrigger::Append(tick.emotion)),
            Some(_) => None,
        };
        self.last_for_queue = Some(tick.emotion);
        trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::tick;

    #[test]
    fn low_confidence_never_triggers_the_queue() {
        let mut gate = EmotionGate::new();
        for c in [0, 30, 59] {
            assert_eq!(gate.on_tick(&tick(Emotion::Happy, c)).trigger, None);
        }
        assert_eq!(gate.current_emotion(), None);
    }

    #[test]
    fn first_accepted_tick_replaces_then_changes_append() {
        let mut gate = EmotionGate::new();
        assert_eq!(
            gate.on_tick(&tick(Emotion::Happy, 60)).trigger,
            Some(QueueTrigger::Replace(Emotion::Happy))
        );
        assert_eq!(gate.on_tick(&tick(Emotion::Happy, 95)).trigger, None);
        assert_eq!(
            gate.on_tick(&tick(Emotion::Sad, 61)).trigger,
            Some(QueueTrigger::Append(Emotion::Sad))
        );
        assert_eq!(gate.current_emotion(), Some(Emotion::Sad));
    }

    #[test]
    fn low_confidence_tick_does_not_reset_the_queue_slot() {
        let mut gate = EmotionGate::new();
        gate.on_tick(&tick(Emotion::Happy, 80));
        gate.on_tick(&tick(Emotion::Angry, 40));
        assert_eq!(gate.on_tick(&tick(Emotion::Happy, 80)).trigger, None);
    }

    #[test]
    fn stats_change_needs_prior_emotion_and_confidence_above_50() {
        let mut gate = EmotionGate::new();
        assert!(!gate.on_tick(&tick(Emotion::Happy, 51)).counts_as_change);
        // exactly 50 is not "above" the threshold
        assert!(!gate.on_tick(&tick(Emotion::Sad, 50)).counts_as_change);
        assert!(gate.on_tick(&tick(Emotion::Sad, 51)).counts_as_change);
        assert!(!gate.on_tick(&tick(Emotion::Sad, 90)).counts_as_change);
    }

    #[test]
    fn stats_slot_moves_between_50_and_60_without_touching_queue() {
        let mut gate = EmotionGate::new();
        gate.on_tick(&tick(Emotion::Happy, 90));
        let out = gate.on_tick(&tick(Emotion::Fearful, 55));
        assert!(out.counts_as_change);
        assert_eq!(out.trigger, None);
        // stats slot is now fearful; queue slot still happy
        assert!(gate.on_tick(&tick(Emotion::Happy, 55)).counts_as_change);
        assert_eq!(gate.current_emotion(), Some(Emotion::Happy));
    }
}
