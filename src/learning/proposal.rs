//! Proposal Store - offers made to the operator
//!
//! Proposals are created through the gate and resolved by the operator's
//! classified reply. The store also answers the rate-limit questions the
//! gate needs (how many today, when this topic was last proposed).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::pattern::Pattern;
use crate::error::{FeedbackError, FeedbackResult};
use crate::types::Verdict;

/// Proposal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Snoozed,
    /// No reply arrived within the expiry window
    Expired,
}

impl From<Verdict> for ProposalStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approved => ProposalStatus::Approved,
            Verdict::Rejected => ProposalStatus::Rejected,
            Verdict::Snoozed => ProposalStatus::Snoozed,
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "pending"),
            ProposalStatus::Approved => write!(f, "approved"),
            ProposalStatus::Rejected => write!(f, "rejected"),
            ProposalStatus::Snoozed => write!(f, "snoozed"),
            ProposalStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A single offer to act on a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub pattern_type: String,
    pub pattern_key: String,
    pub message: String,
    /// Pattern confidence when the proposal was made
    pub confidence: f64,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    /// Raw reply text that resolved the proposal
    pub response: Option<String>,
}

impl Proposal {
    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn is_for(&self, pattern_type: &str, key: &str) -> bool {
        self.pattern_type == pattern_type && self.pattern_key == key
    }
}

/// Generate a proposal ID from its creation time
fn generate_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("PRP-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

/// Owns the proposal collection
#[derive(Debug, Clone, Default)]
pub struct ProposalStore {
    proposals: Vec<Proposal>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_proposals(proposals: Vec<Proposal>) -> Self {
        Self { proposals }
    }

    pub fn add(&mut self, pattern: &Pattern, message: &str) -> Proposal {
        self.add_at(pattern, message, Utc::now())
    }

    /// Create a pending proposal for `pattern`
    pub fn add_at(&mut self, pattern: &Pattern, message: &str, now: DateTime<Utc>) -> Proposal {
        let proposal = Proposal {
            id: generate_id(now),
            pattern_type: pattern.pattern_type.clone(),
            pattern_key: pattern.key.clone(),
            message: message.to_string(),
            confidence: pattern.confidence,
            status: ProposalStatus::Pending,
            created_at: now,
            responded_at: None,
            response: None,
        };
        info!("Created proposal {} for {}", proposal.id, pattern.topic());
        self.proposals.push(proposal.clone());
        proposal
    }

    pub fn respond(&mut self, id: &str, verdict: Verdict, raw_reply: &str) -> FeedbackResult<Proposal> {
        self.respond_at(id, verdict, raw_reply, Utc::now())
    }

    /// Resolve a pending proposal
    pub fn respond_at(
        &mut self,
        id: &str,
        verdict: Verdict,
        raw_reply: &str,
        now: DateTime<Utc>,
    ) -> FeedbackResult<Proposal> {
        let proposal = self.proposals
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| FeedbackError::ProposalNotFound(id.to_string()))?;

        if !proposal.is_pending() {
            return Err(FeedbackError::AlreadyResolved {
                id: id.to_string(),
                status: proposal.status,
            });
        }

        proposal.status = verdict.into();
        proposal.responded_at = Some(now);
        proposal.response = Some(raw_reply.to_string());

        info!("Proposal {} {}", id, proposal.status);
        Ok(proposal.clone())
    }

    pub fn get(&self, id: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.id == id)
    }

    /// Number of proposals created on the given UTC day
    pub fn issued_on(&self, day: NaiveDate) -> usize {
        self.proposals.iter()
            .filter(|p| p.created_at.date_naive() == day)
            .count()
    }

    /// When the topic was last proposed, whatever the outcome
    pub fn last_for_topic(&self, pattern_type: &str, key: &str) -> Option<DateTime<Utc>> {
        self.proposals.iter()
            .filter(|p| p.is_for(pattern_type, key))
            .map(|p| p.created_at)
            .max()
    }

    pub fn pending_for(&self, pattern_type: &str, key: &str) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.is_pending() && p.is_for(pattern_type, key))
    }

    pub fn pending(&self) -> Vec<&Proposal> {
        self.proposals.iter().filter(|p| p.is_pending()).collect()
    }

    /// Most recently created pending proposal
    pub fn latest_pending(&self) -> Option<&Proposal> {
        self.proposals.iter()
            .filter(|p| p.is_pending())
            .max_by_key(|p| p.created_at)
    }

    /// Expire pending proposals created before `cutoff`
    pub fn expire_pending(&mut self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for p in self.proposals.iter_mut().filter(|p| p.is_pending() && p.created_at < cutoff) {
            p.status = ProposalStatus::Expired;
            p.responded_at = Some(now);
            info!("Proposal {} expired without a reply", p.id);
            expired += 1;
        }
        expired
    }

    /// Drop resolved proposals created before `cutoff`
    pub fn prune_resolved(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.proposals.len();
        self.proposals.retain(|p| p.is_pending() || p.created_at >= cutoff);
        before - self.proposals.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.iter()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Proposal> {
        self.proposals.clone()
    }
}
