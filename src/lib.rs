//! Adaptive Feedback - proposal and feedback engine for autonomous agents
//!
//! Tracks recurring patterns the agent notices, decides when one is worth
//! proposing to the operator, reads the operator's replies in English and
//! Hebrew, and adjusts confidence from both explicit verdicts and the
//! reaction to autonomous actions.
//!
//! # Example
//!
//! ```ignore
//! use adaptive_feedback::{Config, FeedbackEngine, Signal};
//!
//! let engine = FeedbackEngine::new(Config::default());
//! engine.observe(&Signal::new("cron_failing", "backup"))?;
//! for proposal in engine.propose_ready()? {
//!     println!("{}", proposal.message);
//! }
//! engine.handle_reply_latest("not now")?;
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod classifier;
pub mod learning;
pub mod cli;

pub use config::Config;
pub use error::{FeedbackError, FeedbackResult};
pub use types::{Verdict, Sentiment};

pub use classifier::{classify, classify_sentiment, OutcomeTracker, ResponseClassifier};

pub use learning::{
    FeedbackEngine,
    DecayScheduler,
    Pattern,
    Proposal,
    ProposalStatus,
    Signal,
    StateStore,
    JsonFileStore,
    MemoryStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive feedback and proposal engine", NAME, VERSION)
}
