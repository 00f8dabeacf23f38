//! Error types for the feedback engine
//!
//! Store-level operations return [`FeedbackError`]; the CLI and the I/O paths
//! wrap these in `anyhow` with extra context.

use thiserror::Error;

use crate::learning::ProposalStatus;

/// Errors produced by the pattern and proposal stores
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// The (type, key) identity of a pattern is malformed
    #[error("invalid pattern {field}: {reason}")]
    InvalidIdentity {
        field: &'static str,
        reason: &'static str,
    },

    /// A caller-supplied seed is outside the configured confidence bounds or not finite
    #[error("invalid confidence {0}: must be a finite value within the configured min/max confidence")]
    InvalidConfidence(f64),

    #[error("pattern not found: {pattern_type}/{key}")]
    PatternNotFound { pattern_type: String, key: String },

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    /// Proposal was already resolved and cannot be answered again
    #[error("proposal {id} is already {status}")]
    AlreadyResolved { id: String, status: ProposalStatus },

    /// Internal lock was poisoned by a panicking thread
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("state store error: {0}")]
    State(#[from] anyhow::Error),
}

pub type FeedbackResult<T> = std::result::Result<T, FeedbackError>;
