//! Shared types used across modules
//!
//! This module contains types that are used by both the classifiers and the
//! stores, kept here to avoid circular dependencies.

use serde::{Deserialize, Serialize};

/// Operator verdict on a proposal, as read from a free-text reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    Rejected,
    Snoozed,
}

impl Verdict {
    /// Parse from the lowercase wire name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "approved" => Some(Verdict::Approved),
            "rejected" => Some(Verdict::Rejected),
            "snoozed" => Some(Verdict::Snoozed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "approved"),
            Verdict::Rejected => write!(f, "rejected"),
            Verdict::Snoozed => write!(f, "snoozed"),
        }
    }
}

/// Implicit judgement of an autonomous action, read from the next reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// Round a confidence value to two decimals.
///
/// All confidence arithmetic goes through this so thresholds such as 0.70 are
/// hit exactly after repeated 0.05 steps.
pub fn round_confidence(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
