//! Rule-based session insights.
//!
//! Rules run in a fixed order and each contributes at most one insight:
//! dominant emotion, variability, session length, mood boost. An empty log
//! short-circuits to a single "no data" insight.

use crate::analytics::SessionSnapshot;
use crate::emotion::{Emotion, Valence};
use serde::Serialize;

const HIGH_CHANGE_RATE_PER_MIN: f64 = 2.0;
const LOW_CHANGE_RATE_PER_MIN: f64 = 0.5;
const STABLE_MIN_MINUTES: f64 = 2.0;
const EXTENDED_SESSION_MINUTES: f64 = 10.0;
const LOW_HAPPY_PERCENT: f64 = 30.0;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Positive,
    Neutral,
    Concern,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

impl Insight {
    fn new(kind: InsightKind, title: &str, description: String, recommendation: &str) -> Self {
        Self {
            kind,
            title: title.to_owned(),
            description,
            recommendation: recommendation.to_owned(),
        }
    }
}

pub fn generate(snapshot: &SessionSnapshot) -> Vec<Insight> {
    if snapshot.log.is_empty() {
        return vec![Insight::new(
            InsightKind::Neutral,
            "No Data Yet",
            "Start analyzing to see insights about your emotional state.".to_owned(),
            "Begin emotion analysis to track your emotional patterns.",
        )];
    }

    let mut insights = Vec::with_capacity(4);
    let shares = snapshot.shares();

    // First maximum in histogram order wins ties.
    let top = shares
        .iter()
        .reduce(|best, share| if best.percentage >= share.percentage { best } else { share });
    if let Some(top) = top {
        insights.push(dominant_emotion(top.emotion, top.percentage));
    }

    let minutes = snapshot.minutes();
    let change_rate = if minutes > 0.0 {
        f64::from(snapshot.change_count) / minutes
    } else {
        0.0
    };
    if change_rate > HIGH_CHANGE_RATE_PER_MIN {
        insights.push(Insight::new(
            InsightKind::Concern,
            "High Emotional Variability",
            format!(
                "Your emotions changed {} times in {:.1} minutes.",
                snapshot.change_count, minutes
            ),
            "High emotional variability might indicate stress. Try grounding techniques: \
             focus on 5 things you can see, 4 you can touch, 3 you can hear.",
        ));
    } else if change_rate < LOW_CHANGE_RATE_PER_MIN && minutes > STABLE_MIN_MINUTES {
        insights.push(Insight::new(
            InsightKind::Neutral,
            "Stable Emotional State",
            "Your emotions have been relatively stable throughout the session.".to_owned(),
            "Emotional stability is good! Consider adding some variety to your activities \
             if you feel too monotonous.",
        ));
    }

    if minutes > EXTENDED_SESSION_MINUTES {
        insights.push(Insight::new(
            InsightKind::Positive,
            "Extended Session",
            format!("You've been engaged for {minutes:.1} minutes."),
            "Long sessions can be draining. Consider taking a short break to stretch or hydrate.",
        ));
    }

    let happy = shares
        .iter()
        .find(|s| s.emotion == Emotion::Happy)
        .map_or(0.0, |s| s.percentage);
    if happy < LOW_HAPPY_PERCENT {
        insights.push(Insight::new(
            InsightKind::Neutral,
            "Mood Enhancement Opportunity",
            "Limited positive emotions detected in this session.".to_owned(),
            "Try smiling, listening to upbeat music, thinking of something you're grateful \
             for, or watching something funny.",
        ));
    }

    insights
}

fn dominant_emotion(emotion: Emotion, percentage: f64) -> Insight {
    match emotion.valence() {
        Valence::Positive => Insight::new(
            InsightKind::Positive,
            "Positive Emotional State",
            format!("You've shown {emotion} emotions {percentage:.1}% of the time."),
            "Great! Keep engaging in activities that bring you joy and maintain this \
             positive energy.",
        ),
        Valence::Negative => Insight::new(
            InsightKind::Concern,
            "Elevated Stress Indicators",
            format!("{emotion} emotions dominated {percentage:.1}% of your session."),
            "Consider taking deep breaths, practicing mindfulness, or engaging in calming \
             activities like meditation or gentle music.",
        ),
        Valence::Neutral => Insight::new(
            InsightKind::Neutral,
            "Balanced Emotional State",
            format!("Your emotions have been primarily neutral ({percentage:.1}% of the time)."),
            "Try engaging in activities that spark joy or excitement to enhance your mood.",
        ),
    }
}
