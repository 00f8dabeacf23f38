//! Proposal Gate - rate limits on surfacing proposals
//!
//! Three independent rules, checked in order with the first refusal winning:
//! a daily cap, a per-topic cooldown and a cooldown after rejection. A refusal
//! is a normal outcome, not an error.

use chrono::{DateTime, Duration, Utc};

use super::pattern::Pattern;
use crate::config::GateConfig;
use crate::types::Verdict;

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    DailyCapReached { issued: usize, cap: usize },
    TopicCooldown { remaining: Duration },
    RejectionCooldown { remaining: Duration },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

impl std::fmt::Display for GateDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateDecision::Allowed => write!(f, "allowed"),
            GateDecision::DailyCapReached { issued, cap } => {
                write!(f, "daily cap reached ({}/{})", issued, cap)
            }
            GateDecision::TopicCooldown { remaining } => {
                write!(f, "topic cooldown ({}m left)", remaining.num_minutes())
            }
            GateDecision::RejectionCooldown { remaining } => {
                write!(f, "rejected recently ({}h left)", remaining.num_hours())
            }
        }
    }
}

/// Rate-limiting policy for new proposals
#[derive(Debug, Clone, Default)]
pub struct ProposalGate {
    config: GateConfig,
}

impl ProposalGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn can_propose(
        &self,
        pattern: &Pattern,
        issued_today: usize,
        last_for_topic: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(pattern, issued_today, last_for_topic, now).is_allowed()
    }

    /// Check every rule in order and report the first refusal
    pub fn evaluate(
        &self,
        pattern: &Pattern,
        issued_today: usize,
        last_for_topic: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if issued_today >= self.config.max_proposals_per_day {
            return GateDecision::DailyCapReached {
                issued: issued_today,
                cap: self.config.max_proposals_per_day,
            };
        }

        if let Some(last) = last_for_topic {
            let elapsed = now - last;
            let cooldown = self.config.topic_cooldown();
            if elapsed < cooldown {
                return GateDecision::TopicCooldown { remaining: cooldown - elapsed };
            }
        }

        if pattern.user_feedback == Some(Verdict::Rejected) {
            if let Some(at) = pattern.feedback_at {
                let elapsed = now - at;
                let cooldown = self.config.rejection_cooldown();
                if elapsed < cooldown {
                    return GateDecision::RejectionCooldown { remaining: cooldown - elapsed };
                }
            }
        }

        GateDecision::Allowed
    }
}
