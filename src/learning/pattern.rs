//! Pattern Store - recurring signals the agent is building trust in
//!
//! Each pattern is keyed by `(type, key)`. Re-observation reinforces
//! confidence in fixed steps up to a ceiling; time without re-observation
//! decays it, and patterns that fall below the floor are dropped.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{DecayConfig, EngineConfig};
use crate::error::{FeedbackError, FeedbackResult};
use crate::types::{round_confidence, Sentiment, Verdict};

/// Lifecycle marker for a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    Observed,
    Proposed,
}

impl std::fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternStatus::Observed => write!(f, "observed"),
            PatternStatus::Proposed => write!(f, "proposed"),
        }
    }
}

/// A tracked recurring signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub key: String,
    pub description: String,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrences: u64,
    pub proposed_action: Option<String>,
    pub status: PatternStatus,
    /// Last operator verdict on a proposal about this pattern
    pub user_feedback: Option<Verdict>,
    pub feedback_at: Option<DateTime<Utc>>,
    /// Post-grace weeks already charged since `last_seen`
    #[serde(default)]
    pub decayed_weeks: u32,
}

impl Pattern {
    pub fn is(&self, pattern_type: &str, key: &str) -> bool {
        self.pattern_type == pattern_type && self.key == key
    }

    /// Topic label used in logs and proposal ids
    pub fn topic(&self) -> String {
        format!("{}:{}", self.pattern_type, self.key)
    }
}

/// One observation reported by a signal producer
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub pattern_type: String,
    pub key: String,
    pub description: Option<String>,
    /// Seed confidence, only used when the pattern is new
    pub confidence: Option<f64>,
    pub proposed_action: Option<String>,
}

impl Signal {
    pub fn new(pattern_type: &str, key: &str) -> Self {
        Self {
            pattern_type: pattern_type.to_string(),
            key: key.to_string(),
            description: None,
            confidence: None,
            proposed_action: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.proposed_action = Some(action.to_string());
        self
    }
}

/// Summary of one decay pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecayReport {
    /// Patterns whose confidence was reduced and kept
    pub decayed: usize,
    /// Topics of patterns deleted for falling below the floor
    pub removed: Vec<String>,
    /// Pending proposals that went unanswered past the expiry window
    pub expired_proposals: usize,
    /// Resolved proposals dropped past retention
    pub pruned_proposals: usize,
}

/// Check a `(type, key)` pair without coercing it
pub fn validate_identity(pattern_type: &str, key: &str) -> FeedbackResult<()> {
    for (field, value) in [("type", pattern_type), ("key", key)] {
        if value.trim().is_empty() {
            return Err(FeedbackError::InvalidIdentity { field, reason: "must not be empty" });
        }
        if value.trim() != value {
            return Err(FeedbackError::InvalidIdentity {
                field,
                reason: "must not have leading or trailing whitespace",
            });
        }
        if value.chars().any(char::is_control) {
            return Err(FeedbackError::InvalidIdentity {
                field,
                reason: "must not contain control characters",
            });
        }
    }
    if pattern_type.contains(':') {
        return Err(FeedbackError::InvalidIdentity { field: "type", reason: "must not contain ':'" });
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Owns the pattern collection
#[derive(Debug, Clone)]
pub struct PatternStore {
    patterns: Vec<Pattern>,
    engine: EngineConfig,
    decay: DecayConfig,
}

impl PatternStore {
    pub fn new(engine: EngineConfig, decay: DecayConfig) -> Self {
        Self { patterns: Vec::new(), engine, decay }
    }

    /// Rebuild from persisted records
    pub fn from_patterns(patterns: Vec<Pattern>, engine: EngineConfig, decay: DecayConfig) -> Self {
        Self { patterns, engine, decay }
    }

    pub fn find(&self, pattern_type: &str, key: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.is(pattern_type, key))
    }

    fn find_mut(&mut self, pattern_type: &str, key: &str) -> FeedbackResult<&mut Pattern> {
        self.patterns
            .iter_mut()
            .find(|p| p.is(pattern_type, key))
            .ok_or_else(|| FeedbackError::PatternNotFound {
                pattern_type: pattern_type.to_string(),
                key: key.to_string(),
            })
    }

    pub fn upsert(&mut self, signal: &Signal) -> FeedbackResult<Pattern> {
        self.upsert_at(signal, Utc::now())
    }

    /// Record an observation: create the pattern or reinforce it
    pub fn upsert_at(&mut self, signal: &Signal, now: DateTime<Utc>) -> FeedbackResult<Pattern> {
        validate_identity(&signal.pattern_type, &signal.key)?;
        if let Some(seed) = signal.confidence {
            if !seed.is_finite() || seed < self.engine.min_confidence || seed > self.engine.max_confidence {
                return Err(FeedbackError::InvalidConfidence(seed));
            }
        }

        let step = self.engine.reinforce_step;
        let ceiling = self.engine.max_confidence;

        if let Some(existing) = self.patterns.iter_mut().find(|p| p.is(&signal.pattern_type, &signal.key)) {
            existing.occurrences += 1;
            existing.last_seen = now;
            existing.decayed_weeks = 0;
            existing.confidence = round_confidence((existing.confidence + step).min(ceiling));
            if let Some(description) = non_empty(&signal.description) {
                existing.description = description.to_string();
            }
            if let Some(action) = non_empty(&signal.proposed_action) {
                existing.proposed_action = Some(action.to_string());
            }
            debug!(
                "Reinforced pattern {} to {:.2} ({} occurrences)",
                existing.topic(), existing.confidence, existing.occurrences
            );
            return Ok(existing.clone());
        }

        let pattern = Pattern {
            pattern_type: signal.pattern_type.clone(),
            key: signal.key.clone(),
            description: non_empty(&signal.description).unwrap_or_default().to_string(),
            confidence: signal.confidence.unwrap_or(self.engine.initial_confidence),
            first_seen: now,
            last_seen: now,
            occurrences: 1,
            proposed_action: non_empty(&signal.proposed_action).map(str::to_string),
            status: PatternStatus::Observed,
            user_feedback: None,
            feedback_at: None,
            decayed_weeks: 0,
        };
        info!("New pattern {} at confidence {:.2}", pattern.topic(), pattern.confidence);
        self.patterns.push(pattern.clone());
        Ok(pattern)
    }

    pub fn decay(&mut self) -> DecayReport {
        self.decay_at(Utc::now())
    }

    /// Age every pattern not seen within the grace period
    pub fn decay_at(&mut self, now: DateTime<Utc>) -> DecayReport {
        let grace = Duration::days(self.decay.grace_days);
        let step = self.decay.step_per_week;
        let floor = self.engine.min_confidence;
        let mut report = DecayReport::default();

        self.patterns.retain_mut(|p| {
            let elapsed = now - p.last_seen;
            if elapsed < grace {
                return true;
            }
            let weeks = ((elapsed - grace).num_days() / 7) as u32;
            let due = weeks.saturating_sub(p.decayed_weeks);
            if due == 0 {
                return true;
            }

            p.confidence = round_confidence(p.confidence - step * f64::from(due));
            p.decayed_weeks = weeks;

            if p.confidence < floor {
                info!("Dropping pattern {} (confidence {:.2})", p.topic(), p.confidence);
                report.removed.push(p.topic());
                false
            } else {
                debug!("Decayed pattern {} by {} week(s) to {:.2}", p.topic(), due, p.confidence);
                report.decayed += 1;
                true
            }
        });

        report
    }

    /// Feed an operator verdict back into the pattern
    pub fn apply_verdict_at(
        &mut self,
        pattern_type: &str,
        key: &str,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> FeedbackResult<Pattern> {
        let penalty = self.engine.rejection_penalty;
        let floor = self.engine.min_confidence;
        let pattern = self.find_mut(pattern_type, key)?;

        match verdict {
            // Trust in approved automations is tracked by whoever executes them
            Verdict::Approved => {}
            Verdict::Rejected => {
                pattern.confidence = round_confidence((pattern.confidence - penalty).max(floor));
                pattern.status = PatternStatus::Observed;
            }
            Verdict::Snoozed => {
                pattern.status = PatternStatus::Observed;
            }
        }
        pattern.user_feedback = Some(verdict);
        pattern.feedback_at = Some(now);

        info!("Pattern {} marked {} (confidence {:.2})", pattern.topic(), verdict, pattern.confidence);
        Ok(pattern.clone())
    }

    /// Adjust confidence from the reply that followed an autonomous action
    pub fn apply_sentiment(
        &mut self,
        pattern_type: &str,
        key: &str,
        sentiment: Sentiment,
    ) -> FeedbackResult<Pattern> {
        let bonus = self.engine.positive_outcome_bonus;
        let penalty = self.engine.negative_outcome_penalty;
        let ceiling = self.engine.max_confidence;
        let floor = self.engine.min_confidence;
        let pattern = self.find_mut(pattern_type, key)?;

        pattern.confidence = match sentiment {
            Sentiment::Positive => round_confidence((pattern.confidence + bonus).min(ceiling)),
            Sentiment::Negative => round_confidence((pattern.confidence - penalty).max(floor)),
        };

        info!("Outcome for {} was {} (confidence {:.2})", pattern.topic(), sentiment, pattern.confidence);
        Ok(pattern.clone())
    }

    pub fn mark_proposed(&mut self, pattern_type: &str, key: &str) -> FeedbackResult<()> {
        self.find_mut(pattern_type, key)?.status = PatternStatus::Proposed;
        Ok(())
    }

    /// Patterns at or above `threshold`, most confident first
    pub fn candidates(&self, threshold: f64) -> Vec<&Pattern> {
        let mut found: Vec<&Pattern> = self.patterns.iter()
            .filter(|p| p.confidence >= threshold)
            .collect();
        found.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        found
    }

    pub fn remove(&mut self, pattern_type: &str, key: &str) -> Option<Pattern> {
        let index = self.patterns.iter().position(|p| p.is(pattern_type, key))?;
        Some(self.patterns.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Pattern> {
        self.patterns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> PatternStore {
        PatternStore::new(EngineConfig::default(), DecayConfig::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_pattern_defaults() {
        let mut store = store();
        let p = store.upsert_at(&Signal::new("cron_failing", "backup").with_description("Backup job fails"), t0()).unwrap();
        assert_eq!(p.confidence, 0.4);
        assert_eq!(p.occurrences, 1);
        assert_eq!(p.status, PatternStatus::Observed);
        assert_eq!(p.first_seen, p.last_seen);
        assert!(p.user_feedback.is_none());
    }

    #[test]
    fn test_reinforcement_matches_closed_form() {
        for seed in [0.1, 0.4, 0.6, 0.9] {
            for n in 0..15u32 {
                let mut store = store();
                let signal = Signal::new("metric", "cost_spike").with_confidence(seed);
                store.upsert_at(&signal, t0()).unwrap();
                for _ in 0..n {
                    store.upsert_at(&signal, t0()).unwrap();
                }
                let expected = round_confidence((seed + 0.05 * f64::from(n)).min(0.95));
                let got = store.find("metric", "cost_spike").unwrap().confidence;
                assert!((got - expected).abs() < 1e-9, "seed {} n {}: {} != {}", seed, n, got, expected);
            }
        }
    }

    #[test]
    fn test_upsert_is_idempotent_on_identity() {
        let mut store = store();
        for i in 0..5 {
            store.upsert_at(&Signal::new("metric", "latency"), t0() + Duration::minutes(i)).unwrap();
        }
        store.upsert_at(&Signal::new("metric", "errors"), t0()).unwrap();
        assert_eq!(store.len(), 2);
        let p = store.find("metric", "latency").unwrap();
        assert_eq!(p.occurrences, 5);
        assert_eq!(p.first_seen, t0());
        assert_eq!(p.last_seen, t0() + Duration::minutes(4));
    }

    #[test]
    fn test_description_only_replaced_by_non_empty() {
        let mut store = store();
        store.upsert_at(&Signal::new("cron_failing", "sync").with_description("first").with_action("disable job"), t0()).unwrap();
        store.upsert_at(&Signal::new("cron_failing", "sync").with_description("  "), t0()).unwrap();
        assert_eq!(store.find("cron_failing", "sync").unwrap().description, "first");
        store.upsert_at(&Signal::new("cron_failing", "sync").with_description("second"), t0()).unwrap();
        let p = store.find("cron_failing", "sync").unwrap();
        assert_eq!(p.description, "second");
        assert_eq!(p.proposed_action.as_deref(), Some("disable job"));
    }

    #[test]
    fn test_malformed_identity_rejected() {
        let mut store = store();
        assert!(matches!(
            store.upsert_at(&Signal::new("", "k"), t0()),
            Err(FeedbackError::InvalidIdentity { field: "type", .. })
        ));
        assert!(matches!(
            store.upsert_at(&Signal::new("metric", " padded "), t0()),
            Err(FeedbackError::InvalidIdentity { field: "key", .. })
        ));
        assert!(store.upsert_at(&Signal::new("a:b", "k"), t0()).is_err());
        assert!(store.upsert_at(&Signal::new("metric", "line\nbreak"), t0()).is_err());
        assert!(matches!(
            store.upsert_at(&Signal::new("metric", "k").with_confidence(1.5), t0()),
            Err(FeedbackError::InvalidConfidence(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_seed_must_lie_within_confidence_bounds() {
        let mut store = store();
        for seed in [1.0, 0.96, 0.01, 0.09, 0.0, f64::NAN] {
            assert!(matches!(
                store.upsert_at(&Signal::new("metric", "seeded").with_confidence(seed), t0()),
                Err(FeedbackError::InvalidConfidence(_))
            ), "seed {} accepted", seed);
        }
        assert!(store.is_empty());

        let top = store.upsert_at(&Signal::new("metric", "top").with_confidence(0.95), t0()).unwrap();
        assert_eq!(top.confidence, 0.95);
        let again = store.upsert_at(&Signal::new("metric", "top"), t0()).unwrap();
        assert_eq!(again.confidence, 0.95);

        let bottom = store.upsert_at(&Signal::new("metric", "bottom").with_confidence(0.1), t0()).unwrap();
        assert_eq!(bottom.confidence, 0.1);
    }

    #[test]
    fn test_decay_leaves_recent_patterns_untouched() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "fresh"), t0()).unwrap();
        for days in [0, 3, 6] {
            let report = store.decay_at(t0() + Duration::days(days) + Duration::hours(23));
            assert_eq!(report, DecayReport::default());
        }
        assert_eq!(store.find("metric", "fresh").unwrap().confidence, 0.4);
    }

    #[test]
    fn test_decay_charges_whole_weeks_beyond_grace() {
        // last seen 7 + 7w days ago => w weeks beyond grace
        for w in 1..=3i64 {
            let mut store = store();
            store.upsert_at(&Signal::new("metric", "old").with_confidence(0.6), t0()).unwrap();
            let report = store.decay_at(t0() + Duration::days(7 + 7 * w) + Duration::hours(5));
            let got = store.find("metric", "old").unwrap().confidence;
            assert_eq!(got, round_confidence(0.6 - 0.05 * w as f64));
            assert_eq!(report.decayed, 1);
        }
    }

    #[test]
    fn test_decay_within_second_week_is_noop() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "idle"), t0()).unwrap();
        store.decay_at(t0() + Duration::days(13));
        assert_eq!(store.find("metric", "idle").unwrap().confidence, 0.4);
    }

    #[test]
    fn test_decay_deletes_below_floor_only() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "at_floor").with_confidence(0.15), t0()).unwrap();
        store.upsert_at(&Signal::new("metric", "below").with_confidence(0.12), t0()).unwrap();
        store.upsert_at(&Signal::new("metric", "kept").with_confidence(0.8), t0()).unwrap();

        let report = store.decay_at(t0() + Duration::days(14));
        // 0.15 - 0.05 = 0.10 is not below the floor
        assert_eq!(store.find("metric", "at_floor").unwrap().confidence, 0.1);
        assert!(store.find("metric", "below").is_none());
        assert_eq!(report.removed, vec!["metric:below".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_repeated_passes_do_not_double_charge() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "daily").with_confidence(0.8), t0()).unwrap();
        for day in 14..21 {
            store.decay_at(t0() + Duration::days(day));
        }
        assert_eq!(store.find("metric", "daily").unwrap().confidence, 0.75);
        store.decay_at(t0() + Duration::days(21));
        assert_eq!(store.find("metric", "daily").unwrap().confidence, 0.7);
    }

    #[test]
    fn test_decay_removes_adjacent_entries() {
        let mut store = store();
        for key in ["a", "b", "c", "d"] {
            store.upsert_at(&Signal::new("metric", key).with_confidence(0.11), t0()).unwrap();
        }
        store.upsert_at(&Signal::new("metric", "e").with_confidence(0.9), t0()).unwrap();
        let report = store.decay_at(t0() + Duration::days(14));
        assert_eq!(report.removed.len(), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reobservation_resets_decay_clock() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "k").with_confidence(0.5), t0()).unwrap();
        store.decay_at(t0() + Duration::days(14));
        store.upsert_at(&Signal::new("metric", "k"), t0() + Duration::days(15)).unwrap();
        let p = store.find("metric", "k").unwrap();
        assert_eq!(p.confidence, 0.5);
        assert_eq!(p.decayed_weeks, 0);
    }

    #[test]
    fn test_verdict_feedback() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "k").with_confidence(0.7), t0()).unwrap();

        let p = store.apply_verdict_at("metric", "k", Verdict::Approved, t0()).unwrap();
        assert_eq!(p.confidence, 0.7);
        assert_eq!(p.user_feedback, Some(Verdict::Approved));

        let p = store.apply_verdict_at("metric", "k", Verdict::Snoozed, t0()).unwrap();
        assert_eq!(p.confidence, 0.7);
        assert_eq!(p.user_feedback, Some(Verdict::Snoozed));

        let p = store.apply_verdict_at("metric", "k", Verdict::Rejected, t0()).unwrap();
        assert_eq!(p.confidence, 0.55);
        assert_eq!(p.feedback_at, Some(t0()));
    }

    #[test]
    fn test_rejection_penalty_floors_at_minimum() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "k").with_confidence(0.2), t0()).unwrap();
        let p = store.apply_verdict_at("metric", "k", Verdict::Rejected, t0()).unwrap();
        assert_eq!(p.confidence, 0.1);
    }

    #[test]
    fn test_sentiment_feedback_bounds() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "k").with_confidence(0.93), t0()).unwrap();
        assert_eq!(store.apply_sentiment("metric", "k", Sentiment::Positive).unwrap().confidence, 0.95);
        assert_eq!(store.apply_sentiment("metric", "k", Sentiment::Negative).unwrap().confidence, 0.8);
        assert!(store.find("metric", "k").unwrap().user_feedback.is_none());
        assert!(matches!(
            store.apply_sentiment("metric", "missing", Sentiment::Positive),
            Err(FeedbackError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_candidates_sorted_by_confidence() {
        let mut store = store();
        store.upsert_at(&Signal::new("metric", "low").with_confidence(0.3), t0()).unwrap();
        store.upsert_at(&Signal::new("metric", "mid").with_confidence(0.7), t0()).unwrap();
        store.upsert_at(&Signal::new("metric", "high").with_confidence(0.9), t0()).unwrap();
        let keys: Vec<&str> = store.candidates(0.7).iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["high", "mid"]);
    }
}
