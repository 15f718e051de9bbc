//! Session statistics: the running aggregate, its snapshots and the
//! insights derived from them.

mod aggregator;
mod insights;
mod snapshot;

pub use aggregator::SessionAggregator;
pub use insights::{generate as generate_insights, Insight, InsightKind};
pub use snapshot::{format_duration, EmotionShare, Histogram, LogEntry, SessionSnapshot};
