//! Serialized access to trust scores shared across pipeline runs.
//!
//! A trust score is the only state that outlives a single run. Concurrent
//! runs for the same agent go through one mutex per agent id, held for a
//! single read or update and never across an agent or scorer call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::trust::{Outcome, TrustBounds, TrustEvent, TrustLedger, TrustScore, TrustSummary};

/// Cloneable handle to one agent's trust score.
#[derive(Debug, Clone)]
pub struct SharedTrustScore {
    inner: Arc<Mutex<TrustScore>>,
}

impl SharedTrustScore {
    pub fn new(trust: TrustScore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(trust)),
        }
    }

    // Updates are all-or-nothing, so a poisoned lock still holds a consistent score.
    fn lock(&self) -> MutexGuard<'_, TrustScore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn qa_sample_rate(&self) -> f64 {
        self.lock().qa_sample_rate()
    }

    pub fn update(
        &self,
        stated_confidence: f64,
        outcome: Outcome,
        reason: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> TrustEvent {
        self.lock()
            .update(stated_confidence, outcome, reason, timestamp)
    }

    pub fn summary(&self) -> TrustSummary {
        self.lock().summary()
    }

    /// Copy of the current score and history.
    pub fn snapshot(&self) -> TrustScore {
        self.lock().clone()
    }

    pub fn to_ledger(&self) -> TrustLedger {
        self.lock().to_ledger()
    }
}

impl From<TrustScore> for SharedTrustScore {
    fn from(trust: TrustScore) -> Self {
        Self::new(trust)
    }
}

/// One shared trust score per agent id.
#[derive(Debug, Default)]
pub struct TrustRegistry {
    bounds: TrustBounds,
    scores: Mutex<HashMap<String, SharedTrustScore>>,
}

impl TrustRegistry {
    /// Registry whose new agents start from `bounds`.
    pub fn new(bounds: TrustBounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Self {
            bounds,
            scores: Mutex::new(HashMap::new()),
        })
    }

    fn scores(&self) -> MutexGuard<'_, HashMap<String, SharedTrustScore>> {
        self.scores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle for `agent_id`, creating a fresh score on first use.
    pub fn get_or_create(&self, agent_id: &str) -> SharedTrustScore {
        let mut scores = self.scores();
        if let Some(existing) = scores.get(agent_id) {
            return existing.clone();
        }
        // Bounds were validated in `new`; `Default` bounds are always valid.
        let trust = TrustScore::with_bounds(agent_id, self.bounds)
            .unwrap_or_else(|_| TrustScore::new(agent_id));
        let shared = SharedTrustScore::new(trust);
        scores.insert(agent_id.to_string(), shared.clone());
        shared
    }

    /// Register a score loaded elsewhere, replacing any existing handle.
    pub fn insert(&self, trust: TrustScore) -> SharedTrustScore {
        let shared = SharedTrustScore::new(trust);
        let agent_id = shared.lock().agent_id().to_string();
        self.scores().insert(agent_id, shared.clone());
        shared
    }

    pub fn get(&self, agent_id: &str) -> Option<SharedTrustScore> {
        self.scores().get(agent_id).cloned()
    }

    /// Summaries for every registered agent, sorted by agent id.
    pub fn summaries(&self) -> Vec<TrustSummary> {
        let handles: Vec<SharedTrustScore> = self.scores().values().cloned().collect();
        let mut summaries: Vec<TrustSummary> = handles.iter().map(SharedTrustScore::summary).collect();
        summaries.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn handles_share_one_score() {
        let registry = TrustRegistry::default();
        let a = registry.get_or_create("writer");
        let b = registry.get_or_create("writer");

        a.update(90.0, Outcome::Good, None, None);
        b.update(90.0, Outcome::Good, None, None);

        assert_eq!(a.snapshot().score(), 2);
        assert_eq!(registry.get("writer").unwrap().summary().total_events, 2);
        assert!(registry.get("editor").is_none());
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let shared = SharedTrustScore::new(TrustScore::new("busy"));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let handle = shared.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        handle.update(70.0, Outcome::Good, None, None);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let trust = shared.snapshot();
        assert_eq!(trust.history().len(), 80);
        assert_eq!(trust.score(), 80);
    }

    #[test]
    fn registry_applies_bounds_and_lists_agents() {
        let registry = TrustRegistry::new(TrustBounds {
            initial: 70,
            min_score: 0,
            max_score: 100,
        })
        .unwrap();
        registry.get_or_create("b");
        registry.insert(TrustScore::new("a"));

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].agent_id, "a");
        assert_eq!(summaries[0].score, 0);
        assert_eq!(summaries[1].score, 70);
    }

    #[test]
    fn registry_rejects_inverted_bounds() {
        let bounds = TrustBounds {
            initial: 0,
            min_score: 1,
            max_score: 0,
        };
        assert!(TrustRegistry::new(bounds).is_err());
    }
}
