//! Adaptive learning - patterns, proposals and the feedback loop
//!
//! Repeated signals become patterns with a confidence score. Confident
//! patterns are surfaced to the operator as proposals, rate limited by the
//! gate, and the operator's replies (explicit or implicit) feed back into
//! confidence. Unseen patterns decay over time.

pub mod pattern;
pub mod proposal;
pub mod gate;
pub mod state;
pub mod engine;
pub mod decay;

pub use pattern::{Pattern, PatternStatus, PatternStore, Signal, DecayReport};
pub use proposal::{Proposal, ProposalStatus, ProposalStore};
pub use gate::{GateDecision, ProposalGate};
pub use state::{StateStore, JsonFileStore, MemoryStore, EngineSnapshot};
pub use engine::{FeedbackEngine, ProposalAttempt, Resolution};
pub use decay::{DecayScheduler, DecayStats};
