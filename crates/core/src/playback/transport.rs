use crate::playback::SinkSignal;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    /// Playback position of the loaded track, 0..=100.
    pub position_percent: f64,
    /// Output level, 0.0..=1.0.
    pub volume: f32,
    pub is_loading: bool,
}

impl TransportState {
    pub fn new(volume: f32) -> Self {
        Self {
            is_playing: false,
            position_percent: 0.0,
            volume: volume.clamp(0.0, 1.0),
            is_loading: false,
        }
    }
}

/// Follow-up work the controller owes after applying a sink signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalEffect {
    None,
    /// The loaded track finished; move to the next queue entry.
    AdvanceQueue,
    /// The sink could not play the loaded track.
    ReportFailure { details: String },
}

/// Sink signal transition table.
///
/// | signal    | is_loading | is_playing | effect        |
/// |-----------|------------|------------|---------------|
/// | loadstart | true       | -          | -             |
/// | canplay   | false      | -          | -             |
/// | ended     | -          | false      | advance queue |
/// | error     | false      | false      | report        |
pub fn transition(state: TransportState, signal: &SinkSignal) -> (TransportState, SignalEffect) {
    match signal {
        SinkSignal::LoadStart => (
            TransportState {
                is_loading: true,
                ..state
            },
            SignalEffect::None,
        ),
        SinkSignal::CanPlay => (
            TransportState {
                is_loading: false,
                ..state
            },
            SignalEffect::None,
        ),
        SinkSignal::Ended => (
            TransportState {
                is_playing: false,
                ..state
            },
            SignalEffect::AdvanceQueue,
        ),
        SinkSignal::Error { details } => (
            TransportState {
                is_loading: false,
                is_playing: false,
                ..state
            },
            SignalEffect::ReportFailure {
                details: details.clone(),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> TransportState {
        TransportState {
            is_playing: true,
            position_percent: 42.0,
            volume: 0.5,
            is_loading: true,
        }
    }

    #[test]
    fn load_signals_only_toggle_loading() {
        let (s, effect) = transition(playing(), &SinkSignal::CanPlay);
        assert!(!s.is_loading);
        assert!(s.is_playing);
        assert_eq!(effect, SignalEffect::None);

        let (s, _) = transition(s, &SinkSignal::LoadStart);
        assert!(s.is_loading);
        assert_eq!(s.position_percent, 42.0);
    }

    #[test]
    fn ended_stops_then_advances() {
        let (s, effect) = transition(playing(), &SinkSignal::Ended);
        assert!(!s.is_playing);
        assert_eq!(effect, SignalEffect::AdvanceQueue);
    }

    #[test]
    fn error_clears_both_flags_and_reports() {
        let (s, effect) = transition(
            playing(),
            &SinkSignal::Error {
                details: "404".to_owned(),
            },
        );
        assert!(!s.is_playing);
        assert!(!s.is_loading);
        assert_eq!(s.volume, 0.5);
        assert_eq!(
            effect,
            SignalEffect::ReportFailure {
                details: "404".to_owned()
            }
        );
    }

    #[test]
    fn new_state_clamps_volume() {
        assert_eq!(TransportState::new(3.0).volume, 1.0);
        assert_eq!(TransportState::new(-1.0).volume, 0.0);
    }
}
