//! Rule-based reply classifiers
//!
//! Both classifiers are built from the same pieces: an ordered list of named
//! passes, each holding phrase sets for every supported language. Passes are
//! applied strictly in sequence and the first match wins, so precedence is
//! part of the structure rather than an accident of list order.
//!
//! - [`response`]: operator replies to proposals (snooze / reject / approve)
//! - [`sentiment`]: short replies after an autonomous action (negative / positive)

pub mod response;
pub mod sentiment;

use regex::Regex;

pub use response::{classify, ResponseClassifier};
pub use sentiment::{classify_sentiment, OutcomeTracker, AutonomousAction, Outcome};

/// Languages with phrase coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Hebrew,
}

/// Phrases for one language within a pass
#[derive(Debug)]
pub struct PhraseSet {
    pub language: Language,
    pub phrases: &'static [&'static str],
}

/// A named classification stage
#[derive(Debug)]
pub struct Pass<T: 'static> {
    pub name: &'static str,
    pub outcome: T,
    pub phrase_sets: &'static [PhraseSet],
}

impl<T> Pass<T> {
    pub fn phrases(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.phrase_sets.iter().flat_map(|set| set.phrases.iter().copied())
    }
}

/// How much of the normalized text a phrase has to cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Phrase starts the text and ends at a word boundary
    Prefix,
    /// Phrase is the whole text, allowing trailing punctuation
    Whole,
}

/// A pass with its phrases compiled into one regex
#[derive(Debug)]
pub struct CompiledPass<T: 'static> {
    pub name: &'static str,
    pub outcome: T,
    regex: Regex,
}

impl<T: Copy> CompiledPass<T> {
    pub fn compile(pass: &Pass<T>, anchor: Anchor) -> Result<Self, regex::Error> {
        let alternatives = pass.phrases()
            .map(|p| regex::escape(&normalize(p)))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = match anchor {
            Anchor::Prefix => format!(r"^(?:{})(?:$|[^\p{{L}}\p{{N}}])", alternatives),
            Anchor::Whole => format!(r"^(?:{})[\s!.,\x{{FE0F}}]*$", alternatives),
        };

        Ok(Self {
            name: pass.name,
            outcome: pass.outcome,
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.regex.is_match(normalized)
    }
}

/// Run passes in order over already-normalized text
pub fn first_match<T: Copy>(passes: &[CompiledPass<T>], normalized: &str) -> Option<T> {
    passes.iter()
        .find(|pass| pass.matches(normalized))
        .map(|pass| pass.outcome)
}

/// Trim, lowercase, fold typographic apostrophes and collapse whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}', '\u{02BC}'], "'")
}
