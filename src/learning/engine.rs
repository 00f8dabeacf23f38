//! Feedback Engine - wires signals, proposals and replies together
//!
//! The engine owns the pattern store and the proposal store, each behind its
//! own mutex. Operations that touch both always lock patterns first. The
//! `*_guarded` entry points are meant for the host's conversation loop: they
//! log failures and return `None` instead of propagating them.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::gate::{GateDecision, ProposalGate};
use super::pattern::{DecayReport, Pattern, PatternStore, Signal};
use super::proposal::{Proposal, ProposalStore};
use super::state::{EngineSnapshot, StateStore};
use crate::classifier::{OutcomeTracker, ResponseClassifier};
use crate::config::Config;
use crate::error::{FeedbackError, FeedbackResult};
use crate::types::{Sentiment, Verdict};

/// Result of handling an operator reply
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub proposal: Proposal,
    /// The pattern after feedback, if it still exists
    pub pattern: Option<Pattern>,
}

/// Outcome of a proposal attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalAttempt {
    Proposed(Proposal),
    BelowThreshold { confidence: f64, threshold: f64 },
    /// The operator already approved this automation
    AlreadyApproved { approved_at: Option<DateTime<Utc>> },
    AlreadyPending(String),
    Refused(GateDecision),
}

impl ProposalAttempt {
    pub fn proposal(self) -> Option<Proposal> {
        match self {
            ProposalAttempt::Proposed(p) => Some(p),
            _ => None,
        }
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> FeedbackResult<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| FeedbackError::LockPoisoned(name))
}

/// Log and swallow a failure at the host boundary
fn guarded<T>(operation: &str, result: FeedbackResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Feedback engine {} failed: {}", operation, e);
            None
        }
    }
}

/// Default wording shown to the operator
pub fn default_message(pattern: &Pattern) -> String {
    let subject = if pattern.description.is_empty() {
        pattern.topic()
    } else {
        pattern.description.clone()
    };
    match &pattern.proposed_action {
        Some(action) => format!(
            "I keep seeing this: {} ({} times). Want me to {}?",
            subject, pattern.occurrences, action
        ),
        None => format!(
            "I keep seeing this: {} ({} times). Should I set up an automation for it?",
            subject, pattern.occurrences
        ),
    }
}

/// The adaptive feedback and proposal engine
#[derive(Clone)]
pub struct FeedbackEngine {
    config: Config,
    patterns: Arc<Mutex<PatternStore>>,
    proposals: Arc<Mutex<ProposalStore>>,
    outcomes: Arc<Mutex<OutcomeTracker>>,
    gate: ProposalGate,
    classifier: Arc<ResponseClassifier>,
    state: Option<Arc<dyn StateStore>>,
}

impl FeedbackEngine {
    /// Create an engine with empty stores and no persistence
    pub fn new(config: Config) -> Self {
        Self::from_snapshot(config, EngineSnapshot::default())
    }

    pub fn from_snapshot(config: Config, snapshot: EngineSnapshot) -> Self {
        let patterns = PatternStore::from_patterns(
            snapshot.patterns,
            config.engine.clone(),
            config.decay.clone(),
        );
        let mut outcomes = OutcomeTracker::new(config.outcome.max_reply_chars);
        outcomes.restore(snapshot.pending_outcome);
        Self {
            gate: ProposalGate::new(config.gate.clone()),
            outcomes: Arc::new(Mutex::new(outcomes)),
            patterns: Arc::new(Mutex::new(patterns)),
            proposals: Arc::new(Mutex::new(ProposalStore::from_proposals(snapshot.proposals))),
            classifier: Arc::new(ResponseClassifier::new()),
            state: None,
            config,
        }
    }

    /// Load state from `store` and persist back to it after every mutation
    pub fn with_state_store(config: Config, store: Arc<dyn StateStore>) -> FeedbackResult<Self> {
        let snapshot = EngineSnapshot::load_from(store.as_ref())?;
        info!(
            "Loaded {} patterns and {} proposals",
            snapshot.patterns.len(), snapshot.proposals.len()
        );
        let mut engine = Self::from_snapshot(config, snapshot);
        engine.state = Some(store);
        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Signals ---

    pub fn observe(&self, signal: &Signal) -> FeedbackResult<Pattern> {
        self.observe_at(signal, Utc::now())
    }

    pub fn observe_at(&self, signal: &Signal, now: DateTime<Utc>) -> FeedbackResult<Pattern> {
        let pattern = lock(&self.patterns, "pattern store")?.upsert_at(signal, now)?;
        self.persist_if_attached()?;
        Ok(pattern)
    }

    pub fn observe_guarded(&self, signal: &Signal) -> Option<Pattern> {
        guarded("observe", self.observe(signal))
    }

    pub fn find(&self, pattern_type: &str, key: &str) -> FeedbackResult<Option<Pattern>> {
        Ok(lock(&self.patterns, "pattern store")?.find(pattern_type, key).cloned())
    }

    pub fn patterns(&self) -> FeedbackResult<Vec<Pattern>> {
        Ok(lock(&self.patterns, "pattern store")?.to_vec())
    }

    // --- Proposals ---

    pub fn propose(&self, pattern_type: &str, key: &str, message: Option<&str>) -> FeedbackResult<ProposalAttempt> {
        self.propose_at(pattern_type, key, message, Utc::now())
    }

    /// Try to surface a proposal for one pattern
    pub fn propose_at(
        &self,
        pattern_type: &str,
        key: &str,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> FeedbackResult<ProposalAttempt> {
        let (attempt, expired) = {
            let mut patterns = lock(&self.patterns, "pattern store")?;
            let mut proposals = lock(&self.proposals, "proposal store")?;
            let pattern = patterns.find(pattern_type, key)
                .cloned()
                .ok_or_else(|| FeedbackError::PatternNotFound {
                    pattern_type: pattern_type.to_string(),
                    key: key.to_string(),
                })?;
            let expired = self.expire_stale(&mut proposals, now);
            let attempt = self.attempt(&pattern, message, now, &mut proposals);
            if matches!(attempt, ProposalAttempt::Proposed(_)) {
                patterns.mark_proposed(pattern_type, key)?;
            }
            (attempt, expired)
        };

        if matches!(attempt, ProposalAttempt::Proposed(_)) || expired > 0 {
            self.persist_if_attached()?;
        }
        Ok(attempt)
    }

    /// Propose every eligible pattern, most confident first, until the gate says stop
    pub fn propose_ready_at(&self, now: DateTime<Utc>) -> FeedbackResult<Vec<Proposal>> {
        let (created, expired) = {
            let mut patterns = lock(&self.patterns, "pattern store")?;
            let mut proposals = lock(&self.proposals, "proposal store")?;
            let candidates: Vec<Pattern> = patterns.candidates(self.config.engine.propose_threshold)
                .into_iter()
                .cloned()
                .collect();

            let expired = self.expire_stale(&mut proposals, now);
            let mut created = Vec::new();
            for pattern in candidates {
                if let ProposalAttempt::Proposed(proposal) = self.attempt(&pattern, None, now, &mut proposals) {
                    patterns.mark_proposed(&pattern.pattern_type, &pattern.key)?;
                    created.push(proposal);
                }
            }
            (created, expired)
        };

        if !created.is_empty() || expired > 0 {
            self.persist_if_attached()?;
        }
        Ok(created)
    }

    pub fn propose_ready(&self) -> FeedbackResult<Vec<Proposal>> {
        self.propose_ready_at(Utc::now())
    }

    pub fn propose_ready_guarded(&self) -> Option<Vec<Proposal>> {
        guarded("propose", self.propose_ready())
    }

    fn expire_stale(&self, proposals: &mut ProposalStore, now: DateTime<Utc>) -> usize {
        proposals.expire_pending(now - self.config.gate.pending_expiry(), now)
    }

    fn attempt(
        &self,
        pattern: &Pattern,
        message: Option<&str>,
        now: DateTime<Utc>,
        proposals: &mut ProposalStore,
    ) -> ProposalAttempt {
        if pattern.user_feedback == Some(Verdict::Approved) {
            debug!("Not proposing {}: already approved", pattern.topic());
            return ProposalAttempt::AlreadyApproved { approved_at: pattern.feedback_at };
        }
        let threshold = self.config.engine.propose_threshold;
        if pattern.confidence < threshold {
            return ProposalAttempt::BelowThreshold { confidence: pattern.confidence, threshold };
        }
        if let Some(pending) = proposals.pending_for(&pattern.pattern_type, &pattern.key) {
            debug!("Proposal {} still pending for {}", pending.id, pattern.topic());
            return ProposalAttempt::AlreadyPending(pending.id.clone());
        }

        let issued_today = proposals.issued_on(now.date_naive());
        let last = proposals.last_for_topic(&pattern.pattern_type, &pattern.key);
        let decision = self.gate.evaluate(pattern, issued_today, last, now);
        if !decision.is_allowed() {
            debug!("Not proposing {}: {}", pattern.topic(), decision);
            return ProposalAttempt::Refused(decision);
        }

        let text = message.map(str::to_string).unwrap_or_else(|| default_message(pattern));
        ProposalAttempt::Proposed(proposals.add_at(pattern, &text, now))
    }

    pub fn pending_proposals(&self) -> FeedbackResult<Vec<Proposal>> {
        Ok(lock(&self.proposals, "proposal store")?.pending().into_iter().cloned().collect())
    }

    pub fn proposals(&self) -> FeedbackResult<Vec<Proposal>> {
        Ok(lock(&self.proposals, "proposal store")?.to_vec())
    }

    // --- Replies ---

    pub fn resolve(&self, proposal_id: &str, verdict: Verdict, raw_reply: &str) -> FeedbackResult<Resolution> {
        self.resolve_at(proposal_id, verdict, raw_reply, Utc::now())
    }

    /// Resolve a proposal with an explicit verdict
    pub fn resolve_at(
        &self,
        proposal_id: &str,
        verdict: Verdict,
        raw_reply: &str,
        now: DateTime<Utc>,
    ) -> FeedbackResult<Resolution> {
        let resolution = {
            let mut patterns = lock(&self.patterns, "pattern store")?;
            let mut proposals = lock(&self.proposals, "proposal store")?;
            let proposal = proposals.respond_at(proposal_id, verdict, raw_reply, now)?;
            let pattern = match patterns.apply_verdict_at(&proposal.pattern_type, &proposal.pattern_key, verdict, now) {
                Ok(pattern) => Some(pattern),
                Err(FeedbackError::PatternNotFound { .. }) => {
                    debug!("Pattern for proposal {} no longer exists", proposal.id);
                    None
                }
                Err(e) => return Err(e),
            };
            Resolution { proposal, pattern }
        };
        self.persist_if_attached()?;
        Ok(resolution)
    }

    pub fn handle_reply(&self, proposal_id: &str, text: &str) -> FeedbackResult<Option<Resolution>> {
        self.handle_reply_at(proposal_id, text, Utc::now())
    }

    /// Classify an operator reply and resolve the proposal if it is a verdict
    pub fn handle_reply_at(
        &self,
        proposal_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> FeedbackResult<Option<Resolution>> {
        match self.classifier.classify(text) {
            Some(verdict) => self.resolve_at(proposal_id, verdict, text, now).map(Some),
            None => {
                debug!("Reply to {} is not a verdict", proposal_id);
                Ok(None)
            }
        }
    }

    /// Route a reply to the most recent pending proposal
    pub fn handle_reply_latest(&self, text: &str) -> FeedbackResult<Option<Resolution>> {
        let latest = lock(&self.proposals, "proposal store")?
            .latest_pending()
            .map(|p| p.id.clone());
        match latest {
            Some(id) => self.handle_reply(&id, text),
            None => Ok(None),
        }
    }

    pub fn handle_reply_guarded(&self, proposal_id: &str, text: &str) -> Option<Resolution> {
        guarded("reply", self.handle_reply(proposal_id, text)).flatten()
    }

    // --- Outcomes ---

    /// Arm outcome tracking for the next inbound message
    pub fn record_autonomous_action(&self, pattern_type: &str, key: &str) -> FeedbackResult<()> {
        lock(&self.outcomes, "outcome tracker")?.record_action(pattern_type, key);
        debug!("Watching next reply for outcome of {}:{}", pattern_type, key);
        self.persist_if_attached()
    }

    /// Read the next inbound message as implicit feedback, if armed
    pub fn handle_inbound(&self, text: &str) -> FeedbackResult<Option<Sentiment>> {
        let (was_armed, outcome) = {
            let mut tracker = lock(&self.outcomes, "outcome tracker")?;
            (tracker.is_armed(), tracker.observe_reply(text))
        };
        let Some(outcome) = outcome else {
            if was_armed {
                self.persist_if_attached()?;
            }
            return Ok(None);
        };

        let applied = lock(&self.patterns, "pattern store")?
            .apply_sentiment(&outcome.action.pattern_type, &outcome.action.pattern_key, outcome.sentiment);
        self.persist_if_attached()?;
        match applied {
            Ok(_) => {}
            Err(FeedbackError::PatternNotFound { .. }) => {
                debug!(
                    "Outcome for {}:{} has no pattern to update",
                    outcome.action.pattern_type, outcome.action.pattern_key
                );
            }
            Err(e) => return Err(e),
        }
        Ok(Some(outcome.sentiment))
    }

    pub fn handle_inbound_guarded(&self, text: &str) -> Option<Sentiment> {
        guarded("outcome", self.handle_inbound(text)).flatten()
    }

    // --- Maintenance ---

    /// Age patterns and drop old resolved proposals
    pub fn run_decay_at(&self, now: DateTime<Utc>) -> FeedbackResult<DecayReport> {
        let retention = Duration::days(self.config.decay.proposal_retention_days);
        let report = {
            let mut patterns = lock(&self.patterns, "pattern store")?;
            let mut proposals = lock(&self.proposals, "proposal store")?;
            let mut report = patterns.decay_at(now);
            report.expired_proposals = self.expire_stale(&mut proposals, now);
            report.pruned_proposals = proposals.prune_resolved(now - retention);
            report
        };
        info!(
            "Decay pass: {} decayed, {} removed, {} proposals expired, {} pruned",
            report.decayed, report.removed.len(), report.expired_proposals, report.pruned_proposals
        );
        self.persist_if_attached()?;
        Ok(report)
    }

    pub fn run_decay(&self) -> FeedbackResult<DecayReport> {
        self.run_decay_at(Utc::now())
    }

    pub fn run_decay_guarded(&self) -> Option<DecayReport> {
        guarded("decay", self.run_decay())
    }

    // --- Persistence ---

    pub fn snapshot(&self) -> FeedbackResult<EngineSnapshot> {
        let patterns = lock(&self.patterns, "pattern store")?;
        let proposals = lock(&self.proposals, "proposal store")?;
        let outcomes = lock(&self.outcomes, "outcome tracker")?;
        Ok(EngineSnapshot {
            patterns: patterns.to_vec(),
            proposals: proposals.to_vec(),
            pending_outcome: outcomes.armed().cloned(),
        })
    }

    pub fn persist(&self) -> FeedbackResult<()> {
        match &self.state {
            Some(store) => Ok(self.snapshot()?.save_to(store.as_ref())?),
            None => Ok(()),
        }
    }

    pub fn persist_guarded(&self) -> Option<()> {
        guarded("persist", self.persist())
    }

    fn persist_if_attached(&self) -> FeedbackResult<()> {
        if self.state.is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::state::{MemoryStore, MockStateStore};
    use crate::learning::ProposalStatus;
    use crate::types::round_confidence;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 6, 8, 0, 0).unwrap()
    }

    fn engine() -> FeedbackEngine {
        FeedbackEngine::new(Config::default())
    }

    fn ready_pattern(engine: &FeedbackEngine, key: &str) {
        engine.observe_at(&Signal::new("cron_failing", key).with_confidence(0.8), t0()).unwrap();
    }

    #[test]
    fn test_below_threshold_not_proposed() {
        let engine = engine();
        engine.observe_at(&Signal::new("metric", "cost"), t0()).unwrap();
        let attempt = engine.propose_at("metric", "cost", None, t0()).unwrap();
        assert!(matches!(attempt, ProposalAttempt::BelowThreshold { .. }));
    }

    #[test]
    fn test_propose_unknown_pattern_is_error() {
        let engine = engine();
        assert!(matches!(
            engine.propose_at("metric", "ghost", None, t0()),
            Err(FeedbackError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_proposal_marks_pattern_and_uses_default_message() {
        let engine = engine();
        engine.observe_at(
            &Signal::new("cron_failing", "backup")
                .with_confidence(0.8)
                .with_description("Nightly backup keeps failing")
                .with_action("pause the backup job"),
            t0(),
        ).unwrap();

        let proposal = engine.propose_at("cron_failing", "backup", None, t0()).unwrap().proposal().unwrap();
        assert!(proposal.message.contains("Nightly backup keeps failing"));
        assert!(proposal.message.contains("pause the backup job"));
        let pattern = engine.find("cron_failing", "backup").unwrap().unwrap();
        assert_eq!(pattern.status, crate::learning::PatternStatus::Proposed);
    }

    #[test]
    fn test_pending_proposal_blocks_duplicate() {
        let engine = engine();
        ready_pattern(&engine, "a");
        let first = engine.propose_at("cron_failing", "a", Some("msg"), t0()).unwrap().proposal().unwrap();
        let again = engine.propose_at("cron_failing", "a", Some("msg"), t0() + Duration::hours(5)).unwrap();
        assert_eq!(again, ProposalAttempt::AlreadyPending(first.id));
    }

    #[test]
    fn test_daily_cap_across_patterns() {
        let engine = engine();
        for key in ["a", "b", "c", "d", "e"] {
            ready_pattern(&engine, key);
        }
        let created = engine.propose_ready_at(t0()).unwrap();
        assert_eq!(created.len(), 4);
        // next UTC day the cap resets
        let created = engine.propose_ready_at(t0() + Duration::days(1)).unwrap();
        assert_eq!(created.len(), 1);
    }

    #[test]
    fn test_snooze_allows_reproposal_after_topic_cooldown() {
        let engine = engine();
        ready_pattern(&engine, "a");
        let p = engine.propose_at("cron_failing", "a", None, t0()).unwrap().proposal().unwrap();
        let res = engine.handle_reply_at(&p.id, "not now", t0() + Duration::minutes(1)).unwrap().unwrap();
        assert_eq!(res.proposal.status, ProposalStatus::Snoozed);
        assert_eq!(res.pattern.unwrap().confidence, 0.8);

        let early = engine.propose_at("cron_failing", "a", None, t0() + Duration::minutes(30)).unwrap();
        assert!(matches!(early, ProposalAttempt::Refused(GateDecision::TopicCooldown { .. })));
        let later = engine.propose_at("cron_failing", "a", None, t0() + Duration::hours(3)).unwrap();
        assert!(matches!(later, ProposalAttempt::Proposed(_)));
    }

    #[test]
    fn test_approved_pattern_is_not_proposed_again() {
        let engine = engine();
        engine.observe_at(&Signal::new("metric", "disk").with_confidence(0.9), t0()).unwrap();
        let p = engine.propose_at("metric", "disk", None, t0()).unwrap().proposal().unwrap();
        engine.handle_reply_at(&p.id, "yes", t0() + Duration::minutes(1)).unwrap();

        let attempt = engine.propose_at("metric", "disk", None, t0() + Duration::hours(3)).unwrap();
        assert_eq!(
            attempt,
            ProposalAttempt::AlreadyApproved { approved_at: Some(t0() + Duration::minutes(1)) }
        );
        for day in 1..5 {
            assert!(engine.propose_ready_at(t0() + Duration::days(day)).unwrap().is_empty());
        }
        assert_eq!(engine.proposals().unwrap().len(), 1);
    }

    #[test]
    fn test_unanswered_proposal_expires() {
        let engine = engine();
        ready_pattern(&engine, "a");
        let first = engine.propose_at("cron_failing", "a", None, t0()).unwrap().proposal().unwrap();

        let early = engine.propose_at("cron_failing", "a", None, t0() + Duration::hours(23)).unwrap();
        assert_eq!(early, ProposalAttempt::AlreadyPending(first.id.clone()));

        let second = engine.propose_at("cron_failing", "a", None, t0() + Duration::days(30))
            .unwrap()
            .proposal()
            .unwrap();
        assert_ne!(second.id, first.id);

        let proposals = engine.proposals().unwrap();
        let old = proposals.iter().find(|p| p.id == first.id).unwrap();
        assert_eq!(old.status, ProposalStatus::Expired);
        assert_eq!(engine.pending_proposals().unwrap(), vec![second]);
        assert!(engine.handle_reply_at(&first.id, "yes", t0() + Duration::days(30)).is_err());
    }

    #[test]
    fn test_decay_expires_and_prunes_unanswered_proposals() {
        let engine = engine();
        ready_pattern(&engine, "a");
        engine.propose_at("cron_failing", "a", None, t0()).unwrap();
        engine.observe_at(&Signal::new("cron_failing", "a"), t0() + Duration::days(2)).unwrap();

        let report = engine.run_decay_at(t0() + Duration::days(2)).unwrap();
        assert_eq!(report.expired_proposals, 1);
        assert_eq!(report.pruned_proposals, 0);
        assert!(engine.pending_proposals().unwrap().is_empty());

        let report = engine.run_decay_at(t0() + Duration::days(31)).unwrap();
        assert_eq!(report.expired_proposals, 0);
        assert_eq!(report.pruned_proposals, 1);
        assert!(engine.proposals().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_observations_are_serialized() {
        let engine = engine();
        let threads = 8;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine.observe_at(&Signal::new("metric", "cost"), t0()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let pattern = engine.find("metric", "cost").unwrap().unwrap();
        assert_eq!(pattern.occurrences, threads);
        let expected = round_confidence((0.4 + 0.05 * (threads - 1) as f64).min(0.95));
        assert_eq!(pattern.confidence, expected);
        assert_eq!(engine.patterns().unwrap().len(), 1);
    }

    #[test]
    fn test_unclassified_reply_leaves_proposal_pending() {
        let engine = engine();
        ready_pattern(&engine, "a");
        let p = engine.propose_at("cron_failing", "a", None, t0()).unwrap().proposal().unwrap();
        assert!(engine.handle_reply_at(&p.id, "how are you?", t0()).unwrap().is_none());
        assert_eq!(engine.pending_proposals().unwrap().len(), 1);
    }

    #[test]
    fn test_reply_latest_routes_to_newest_pending() {
        let engine = engine();
        ready_pattern(&engine, "a");
        ready_pattern(&engine, "b");
        engine.propose_at("cron_failing", "a", None, t0()).unwrap();
        engine.propose_at("cron_failing", "b", None, t0() + Duration::minutes(1)).unwrap();
        let res = engine.handle_reply_latest("yes").unwrap().unwrap();
        assert_eq!(res.proposal.pattern_key, "b");
        assert_eq!(res.proposal.status, ProposalStatus::Approved);
    }

    #[test]
    fn test_outcome_feedback_adjusts_pattern_once() {
        let engine = engine();
        engine.observe_at(&Signal::new("metric", "cost").with_confidence(0.6), t0()).unwrap();

        assert_eq!(engine.handle_inbound("perfect").unwrap(), None);

        engine.record_autonomous_action("metric", "cost").unwrap();
        assert_eq!(engine.handle_inbound("perfect").unwrap(), Some(Sentiment::Positive));
        assert_eq!(engine.find("metric", "cost").unwrap().unwrap().confidence, 0.65);

        assert_eq!(engine.handle_inbound("perfect").unwrap(), None);

        engine.record_autonomous_action("metric", "cost").unwrap();
        assert_eq!(engine.handle_inbound("לא עובד").unwrap(), Some(Sentiment::Negative));
        assert_eq!(engine.find("metric", "cost").unwrap().unwrap().confidence, 0.5);
    }

    #[test]
    fn test_state_store_roundtrip() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let engine = FeedbackEngine::with_state_store(Config::default(), store.clone()).unwrap();
        ready_pattern(&engine, "a");
        engine.propose_at("cron_failing", "a", None, t0()).unwrap();

        let reloaded = FeedbackEngine::with_state_store(Config::default(), store).unwrap();
        assert_eq!(reloaded.snapshot().unwrap(), engine.snapshot().unwrap());
    }

    #[test]
    fn test_armed_action_survives_restart() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let engine = FeedbackEngine::with_state_store(Config::default(), store.clone()).unwrap();
        engine.observe_at(&Signal::new("metric", "cost").with_confidence(0.6), t0()).unwrap();
        engine.record_autonomous_action("metric", "cost").unwrap();

        let restarted = FeedbackEngine::with_state_store(Config::default(), store.clone()).unwrap();
        assert_eq!(restarted.handle_inbound("great").unwrap(), Some(Sentiment::Positive));

        let again = FeedbackEngine::with_state_store(Config::default(), store).unwrap();
        assert_eq!(again.handle_inbound("great").unwrap(), None);
        assert_eq!(again.find("metric", "cost").unwrap().unwrap().confidence, 0.65);
    }

    #[test]
    fn test_guarded_calls_swallow_failures() {
        let mut mock = MockStateStore::new();
        mock.expect_load().returning(|_| Ok(None));
        mock.expect_save().returning(|_, _| Err(anyhow::anyhow!("disk full")));
        let engine = FeedbackEngine::with_state_store(Config::default(), Arc::new(mock)).unwrap();

        assert!(engine.observe(&Signal::new("metric", "cost")).is_err());
        assert!(engine.observe_guarded(&Signal::new("metric", "cost")).is_none());
        assert!(engine.observe_guarded(&Signal::new("", "bad")).is_none());
        assert!(engine.run_decay_guarded().is_none());
        assert!(engine.handle_reply_guarded("PRP-missing", "yes").is_none());
    }

    #[test]
    fn test_decay_prunes_old_resolved_proposals() {
        let engine = engine();
        ready_pattern(&engine, "a");
        let p = engine.propose_at("cron_failing", "a", None, t0()).unwrap().proposal().unwrap();
        engine.handle_reply_at(&p.id, "yes", t0()).unwrap();
        engine.observe_at(&Signal::new("cron_failing", "a"), t0() + Duration::days(40)).unwrap();

        let report = engine.run_decay_at(t0() + Duration::days(40)).unwrap();
        assert_eq!(report.pruned_proposals, 1);
        assert!(engine.proposals().unwrap().is_empty());
    }
}
