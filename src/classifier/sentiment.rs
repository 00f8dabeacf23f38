//! Sentiment Classifier - implicit feedback after an autonomous action
//!
//! Only the message immediately following an autonomous action is read, and
//! only when it is short: anything longer is taken to be a new conversation.
//! The whole reply must be an evaluative phrase. Negative phrases are tried
//! before positive ones ("לא עובד" contains "עובד"). Bare acknowledgements
//! such as "ok" or "thanks" are deliberately not in either set.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{first_match, normalize, Anchor, CompiledPass, Language, Pass, PhraseSet};
use crate::types::Sentiment;

/// Replies longer than this (in characters) are never classified
pub const MAX_REPLY_CHARS: usize = 50;

pub static NEGATIVE: Pass<Sentiment> = Pass {
    name: "negative",
    outcome: Sentiment::Negative,
    phrase_sets: &[
        PhraseSet {
            language: Language::English,
            phrases: &[
                "no", "nope", "wrong", "bad", "terrible", "awful", "broken", "not good",
                "not working", "doesn't work", "does not work", "didn't work",
                "it doesn't work", "it's broken", "that's wrong", "undo", "undo that",
                "revert", "revert that", "why did you do that", "stop", "ugh",
                "👎", "❌", "😡", "😠",
            ],
        },
        PhraseSet {
            language: Language::Hebrew,
            phrases: &[
                "לא", "לא טוב", "לא עובד", "זה לא עובד", "לא עבד", "גרוע", "נורא",
                "טעות", "שגוי", "תבטל", "בטל", "למה עשית את זה", "לא ככה",
            ],
        },
    ],
};

pub static POSITIVE: Pass<Sentiment> = Pass {
    name: "positive",
    outcome: Sentiment::Positive,
    phrase_sets: &[
        PhraseSet {
            language: Language::English,
            phrases: &[
                "perfect", "great", "awesome", "excellent", "nice", "good", "good job",
                "great job", "well done", "works", "it works", "that works", "works great",
                "exactly", "love it", "amazing", "brilliant", "spot on",
                "👍", "🙌", "🎉", "❤️", "💯",
            ],
        },
        PhraseSet {
            language: Language::Hebrew,
            phrases: &[
                "מושלם", "מעולה", "מצוין", "יופי", "אחלה", "כל הכבוד", "עובד", "זה עובד",
                "עבד", "בדיוק", "אש", "תותח", "יפה",
            ],
        },
    ],
};

/// Fixed precedence of the sentiment passes
pub static SENTIMENT_PASSES: [&Pass<Sentiment>; 2] = [&NEGATIVE, &POSITIVE];

static COMPILED: Lazy<Vec<CompiledPass<Sentiment>>> = Lazy::new(|| {
    SENTIMENT_PASSES.iter()
        .map(|pass| CompiledPass::compile(pass, Anchor::Whole).expect("sentiment phrases compile"))
        .collect()
});

/// Classify the reply to an autonomous action
pub fn classify_sentiment(text: &str, previous_turn_was_autonomous: bool) -> Option<Sentiment> {
    classify_sentiment_with_limit(text, previous_turn_was_autonomous, MAX_REPLY_CHARS)
}

pub fn classify_sentiment_with_limit(
    text: &str,
    previous_turn_was_autonomous: bool,
    max_chars: usize,
) -> Option<Sentiment> {
    if !previous_turn_was_autonomous {
        return None;
    }
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_chars {
        return None;
    }
    first_match(&COMPILED, &normalize(trimmed))
}

/// The autonomous action whose outcome is being watched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomousAction {
    pub pattern_type: String,
    pub pattern_key: String,
}

/// Classified reply to an autonomous action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: AutonomousAction,
    pub sentiment: Sentiment,
}

/// Holds the "previous turn was autonomous" flag for exactly one reply
#[derive(Debug, Clone)]
pub struct OutcomeTracker {
    armed: Option<AutonomousAction>,
    max_reply_chars: usize,
}

impl Default for OutcomeTracker {
    fn default() -> Self {
        Self::new(MAX_REPLY_CHARS)
    }
}

impl OutcomeTracker {
    pub fn new(max_reply_chars: usize) -> Self {
        Self { armed: None, max_reply_chars }
    }

    /// Note that the agent just acted on its own for this pattern
    pub fn record_action(&mut self, pattern_type: &str, pattern_key: &str) {
        self.armed = Some(AutonomousAction {
            pattern_type: pattern_type.to_string(),
            pattern_key: pattern_key.to_string(),
        });
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed(&self) -> Option<&AutonomousAction> {
        self.armed.as_ref()
    }

    /// Re-arm from persisted state
    pub fn restore(&mut self, action: Option<AutonomousAction>) {
        self.armed = action;
    }

    /// Consume the flag and classify the reply
    pub fn observe_reply(&mut self, text: &str) -> Option<Outcome> {
        let action = self.armed.take()?;
        let sentiment = classify_sentiment_with_limit(text, true, self.max_reply_chars);
        debug!(
            "Reply after autonomous action on {}:{} classified as {:?}",
            action.pattern_type, action.pattern_key, sentiment
        );
        sentiment.map(|sentiment| Outcome { action, sentiment })
    }
}
