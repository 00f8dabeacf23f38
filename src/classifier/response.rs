//! Response Classifier - reads the operator's reply to a proposal
//!
//! Passes run snooze, then reject, then approve. Snooze has to come first:
//! "not now" starts with "no" and "לא עכשיו" starts with "לא", so checking
//! rejection first would turn every snooze into a rejection. Rejection runs
//! before approval so an ambiguous opener never authorizes an action.
//!
//! Matching is anchored at the start of the reply; the rest of the text is
//! free-form.

use once_cell::sync::Lazy;

use super::{first_match, normalize, Anchor, CompiledPass, Language, Pass, PhraseSet};
use crate::types::Verdict;

pub static SNOOZE: Pass<Verdict> = Pass {
    name: "snooze",
    outcome: Verdict::Snoozed,
    phrase_sets: &[
        PhraseSet {
            language: Language::English,
            phrases: &[
                "not now", "not yet", "not today", "later", "maybe later",
                "remind me", "ask me later", "ask again", "tomorrow", "next week",
                "snooze", "another time", "some other time", "hold on", "wait",
            ],
        },
        PhraseSet {
            language: Language::Hebrew,
            phrases: &[
                "לא עכשיו", "לא כרגע", "לא היום", "עוד לא", "אחר כך", "אחרי זה",
                "מאוחר יותר", "תזכיר לי", "תזכירי לי", "בהמשך", "מחר", "בשבוע הבא",
                "רגע", "חכה",
            ],
        },
    ],
};

pub static REJECT: Pass<Verdict> = Pass {
    name: "reject",
    outcome: Verdict::Rejected,
    phrase_sets: &[
        PhraseSet {
            language: Language::English,
            phrases: &[
                "no", "nope", "nah", "skip", "don't", "dont", "do not", "never",
                "never mind", "nevermind", "cancel", "reject", "stop", "forget it",
                "not interested", "leave it",
            ],
        },
        PhraseSet {
            language: Language::Hebrew,
            phrases: &[
                "לא", "ממש לא", "אל תעשה", "אל תעשי", "עזוב", "עזבי", "בטל", "תבטל",
                "דלג", "תדלג", "אין צורך", "שכח מזה", "תשכח מזה",
            ],
        },
    ],
};

pub static APPROVE: Pass<Verdict> = Pass {
    name: "approve",
    outcome: Verdict::Approved,
    phrase_sets: &[
        PhraseSet {
            language: Language::English,
            phrases: &[
                "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "do it",
                "go ahead", "go for it", "approve", "approved", "sounds good",
                "please do", "absolutely", "of course", "let's do it", "lgtm",
                "👍", "✅",
            ],
        },
        PhraseSet {
            language: Language::Hebrew,
            phrases: &[
                "כן", "בטח", "יאללה", "סבבה", "אוקיי", "אוקי", "תעשה", "תעשי",
                "בצע", "קדימה", "מאשר", "מאשרת", "אשר", "בסדר", "לך על זה", "ברור",
            ],
        },
    ],
};

/// Fixed precedence of the response passes
pub static RESPONSE_PASSES: [&Pass<Verdict>; 3] = [&SNOOZE, &REJECT, &APPROVE];

static DEFAULT: Lazy<ResponseClassifier> = Lazy::new(ResponseClassifier::new);

/// Compiled response passes
#[derive(Debug)]
pub struct ResponseClassifier {
    passes: Vec<CompiledPass<Verdict>>,
}

impl ResponseClassifier {
    pub fn new() -> Self {
        let passes = RESPONSE_PASSES.iter()
            .map(|pass| CompiledPass::compile(pass, Anchor::Prefix).expect("response phrases compile"))
            .collect();
        Self { passes }
    }

    pub fn classify(&self, text: &str) -> Option<Verdict> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        first_match(&self.passes, &normalized)
    }

    /// Pass names in evaluation order
    pub fn order(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name).collect()
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a reply with the shared default classifier
pub fn classify(text: &str) -> Option<Verdict> {
    DEFAULT.classify(text)
}
