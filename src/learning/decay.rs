//! Decay scheduler - periodic confidence decay in the background
//!
//! Runs one decay pass per interval on a tokio task. A pass that is still
//! running when the next one is due (or when `run_once` is called by hand)
//! causes the second one to be skipped, never queued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::engine::FeedbackEngine;
use super::pattern::DecayReport;

/// Scheduler statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayStats {
    pub passes: u64,
    pub skipped: u64,
    pub failures: u64,
    pub patterns_removed: u64,
    pub proposals_expired: u64,
    pub proposals_pruned: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_pass: Option<DateTime<Utc>>,
}

pub struct DecayScheduler {
    engine: FeedbackEngine,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stats: Arc<RwLock<DecayStats>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DecayScheduler {
    /// Schedule passes at the engine's configured interval
    pub fn new(engine: FeedbackEngine) -> Self {
        let secs = engine.config().decay.interval_secs.max(1);
        Self::with_interval(engine, Duration::from_secs(secs))
    }

    pub fn with_interval(engine: FeedbackEngine, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            engine,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(DecayStats::default())),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> DecayStats {
        self.stats.read().await.clone()
    }

    /// Spawn the background loop. The first pass runs immediately.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Decay scheduler already running");
            return;
        }

        {
            let mut stats = self.stats.write().await;
            stats.started_at = Some(Utc::now());
        }

        let engine = self.engine.clone();
        let in_flight = self.in_flight.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            info!("Decay scheduler started (every {:?})", period);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Decay scheduler received shutdown signal");
                        break;
                    }

                    _ = interval.tick() => {
                        Self::pass(&engine, &in_flight, &stats).await;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
        });
    }

    /// Signal the loop to exit after the current pass
    pub async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        info!("Stopping decay scheduler...");
        let _ = self.shutdown_tx.send(());
    }

    /// Run a single pass now, unless one is already in flight
    pub async fn run_once(&self) -> Option<DecayReport> {
        Self::pass(&self.engine, &self.in_flight, &self.stats).await
    }

    async fn pass(
        engine: &FeedbackEngine,
        in_flight: &AtomicBool,
        stats: &RwLock<DecayStats>,
    ) -> Option<DecayReport> {
        if in_flight.swap(true, Ordering::SeqCst) {
            debug!("Decay pass already in flight, skipping");
            stats.write().await.skipped += 1;
            return None;
        }

        let result = engine.run_decay();
        in_flight.store(false, Ordering::SeqCst);

        let mut stats = stats.write().await;
        stats.last_pass = Some(Utc::now());
        match result {
            Ok(report) => {
                stats.passes += 1;
                stats.patterns_removed += report.removed.len() as u64;
                stats.proposals_expired += report.expired_proposals as u64;
                stats.proposals_pruned += report.pruned_proposals as u64;
                Some(report)
            }
            Err(e) => {
                warn!("Decay pass failed: {}", e);
                stats.failures += 1;
                None
            }
        }
    }
}
