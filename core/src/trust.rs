//! Trust scores: a per-agent credit score for calibration.
//!
//! Honest uncertainty earns trust, overconfidence loses it. The score maps to
//! a trust level, and the trust level decides how much QA an agent gets:
//!
//! | score   | level       | QA sample rate |
//! |---------|-------------|----------------|
//! | 0-30    | untrusted   | 1.0            |
//! | 31-60   | supervised  | 0.5            |
//! | 61-80   | spot_check  | 0.2            |
//! | 81+     | autonomous  | 0.0            |

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrustError};

/// Stated confidence at or above this turns a bad outcome into an overconfident one.
pub const OVERCONFIDENCE_THRESHOLD: f64 = 80.0;

/// What actually happened to an output the agent delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Good,
    Bad,
    /// The agent flagged an uncertainty and it turned out to be real.
    FlaggedReal,
    /// Review found a problem the agent did not disclose.
    HiddenProblem,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Bad => "bad",
            Self::FlaggedReal => "flagged_real",
            Self::HiddenProblem => "hidden_problem",
        }
    }

    /// Score change for this outcome at the given stated confidence.
    pub fn delta(&self, stated_confidence: f64) -> i64 {
        match self {
            Self::Good => 1,
            Self::Bad if stated_confidence >= OVERCONFIDENCE_THRESHOLD => -3,
            Self::Bad => -1,
            Self::FlaggedReal => 2,
            Self::HiddenProblem => -3,
        }
    }

    fn default_reason(&self, stated_confidence: f64) -> String {
        match self {
            Self::Good => format!("Good output (stated {stated_confidence:.0}%)"),
            Self::Bad if stated_confidence >= OVERCONFIDENCE_THRESHOLD => format!(
                "Bad output with high confidence ({stated_confidence:.0}%); overconfident"
            ),
            Self::Bad => format!(
                "Bad output with low confidence ({stated_confidence:.0}%); at least honest"
            ),
            Self::FlaggedReal => "Flagged uncertainty that was confirmed real".to_string(),
            Self::HiddenProblem => "QA found a problem the agent didn't flag".to_string(),
        }
    }
}

impl FromStr for Outcome {
    type Err = TrustError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "good" => Ok(Self::Good),
            "bad" => Ok(Self::Bad),
            "flagged_real" => Ok(Self::FlaggedReal),
            "hidden_problem" => Ok(Self::HiddenProblem),
            other => Err(TrustError::invalid(format!("unknown outcome: '{other}'"))),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Autonomy granted by the current score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// QA reviews everything.
    Untrusted,
    /// QA reviews flagged items.
    Supervised,
    /// QA spot-checks 20%.
    SpotCheck,
    /// Direct delivery.
    Autonomous,
}

impl TrustLevel {
    /// Upper bounds are inclusive on the lower tier.
    pub fn from_score(score: i64) -> Self {
        match score {
            ..=30 => Self::Untrusted,
            31..=60 => Self::Supervised,
            61..=80 => Self::SpotCheck,
            _ => Self::Autonomous,
        }
    }

    pub fn qa_sample_rate(&self) -> f64 {
        match self {
            Self::Untrusted => 1.0,
            Self::Supervised => 0.5,
            Self::SpotCheck => 0.2,
            Self::Autonomous => 0.0,
        }
    }

    pub fn needs_qa(&self) -> bool {
        matches!(self, Self::Untrusted | Self::Supervised)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untrusted => "untrusted",
            Self::Supervised => "supervised",
            Self::SpotCheck => "spot_check",
            Self::Autonomous => "autonomous",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trust-relevant event. Events are appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEvent {
    /// UUIDv7, time-sortable
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub stated_confidence: f64,
    pub outcome: Outcome,
    pub delta: i64,
    pub reason: String,
}

/// Starting score and clamp range for a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustBounds {
    pub initial: i64,
    pub min_score: i64,
    pub max_score: i64,
}

impl Default for TrustBounds {
    fn default() -> Self {
        Self {
            initial: 0,
            min_score: 0,
            max_score: 100,
        }
    }
}

impl TrustBounds {
    pub fn validate(&self) -> Result<()> {
        if self.min_score > self.max_score {
            return Err(TrustError::invalid(format!(
                "min_score {} exceeds max_score {}",
                self.min_score, self.max_score
            )));
        }
        Ok(())
    }

    fn clamp(&self, score: i64) -> i64 {
        score.clamp(self.min_score, self.max_score)
    }
}

/// Snapshot for logging and telemetry export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustSummary {
    pub agent_id: String,
    pub score: i64,
    pub trust_level: TrustLevel,
    pub total_events: usize,
    pub needs_qa: bool,
    pub qa_sample_rate: f64,
}

/// Persisted form of a trust score. The score itself is rebuilt by replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustLedger {
    pub agent_id: String,
    #[serde(default)]
    pub bounds: TrustBounds,
    #[serde(default)]
    pub history: Vec<TrustEvent>,
}

/// An agent's bounded trust score and its append-only history.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustScore {
    agent_id: String,
    score: i64,
    bounds: TrustBounds,
    history: Vec<TrustEvent>,
}

impl TrustScore {
    /// Fresh score with the default bounds: starts at 0, clamped to `[0, 100]`.
    pub fn new(agent_id: impl Into<String>) -> Self {
        let bounds = TrustBounds::default();
        Self {
            agent_id: agent_id.into(),
            score: bounds.initial,
            bounds,
            history: Vec::new(),
        }
    }

    /// Fresh score with custom bounds. The initial score is clamped into range.
    pub fn with_bounds(agent_id: impl Into<String>, bounds: TrustBounds) -> Result<Self> {
        bounds.validate()?;
        Ok(Self {
            agent_id: agent_id.into(),
            score: bounds.clamp(bounds.initial),
            bounds,
            history: Vec::new(),
        })
    }

    /// Rebuild a score by replaying a persisted history, clamping at every step.
    pub fn from_ledger(ledger: TrustLedger) -> Result<Self> {
        let mut trust = Self::with_bounds(ledger.agent_id, ledger.bounds)?;
        for event in ledger.history {
            trust.score = trust.bounds.clamp(trust.score + event.delta);
            trust.history.push(event);
        }
        Ok(trust)
    }

    pub fn to_ledger(&self) -> TrustLedger {
        TrustLedger {
            agent_id: self.agent_id.clone(),
            bounds: self.bounds,
            history: self.history.clone(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn bounds(&self) -> TrustBounds {
        self.bounds
    }

    pub fn history(&self) -> &[TrustEvent] {
        &self.history
    }

    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.score)
    }

    pub fn needs_qa(&self) -> bool {
        self.trust_level().needs_qa()
    }

    pub fn qa_sample_rate(&self) -> f64 {
        self.trust_level().qa_sample_rate()
    }

    /// Record an outcome and move the score.
    ///
    /// The delta is fixed by the outcome (see [`Outcome::delta`]); the new
    /// score saturates at the bounds. Returns the appended event.
    pub fn update(
        &mut self,
        stated_confidence: f64,
        outcome: Outcome,
        reason: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) -> TrustEvent {
        let delta = outcome.delta(stated_confidence);
        let previous = self.score;
        self.score = self.bounds.clamp(self.score + delta);

        let reason = match reason {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => outcome.default_reason(stated_confidence),
        };
        let event = TrustEvent {
            id: Uuid::now_v7(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
            stated_confidence,
            outcome,
            delta,
            reason,
        };
        self.history.push(event.clone());

        tracing::info!(
            agent_id = %self.agent_id,
            outcome = outcome.as_str(),
            delta,
            previous,
            score = self.score,
            trust_level = self.trust_level().as_str(),
            "trust score updated"
        );
        event
    }

    pub fn summary(&self) -> TrustSummary {
        TrustSummary {
            agent_id: self.agent_id.clone(),
            score: self.score,
            trust_level: self.trust_level(),
            total_events: self.history.len(),
            needs_qa: self.needs_qa(),
            qa_sample_rate: self.qa_sample_rate(),
        }
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrustScore(agent_id={}, score={}, level={})",
            self.agent_id,
            self.score,
            self.trust_level()
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn scoring_rules() {
        let mut trust = TrustScore::with_bounds(
            "writer",
            TrustBounds {
                initial: 50,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(trust.update(95.0, Outcome::Good, None, None).delta, 1);
        assert_eq!(trust.update(40.0, Outcome::Good, None, None).delta, 1);
        assert_eq!(trust.update(80.0, Outcome::Bad, None, None).delta, -3);
        assert_eq!(trust.update(79.9, Outcome::Bad, None, None).delta, -1);
        assert_eq!(trust.update(60.0, Outcome::FlaggedReal, None, None).delta, 2);
        assert_eq!(trust.update(60.0, Outcome::HiddenProblem, None, None).delta, -3);
        assert_eq!(trust.score(), 47);
        assert_eq!(trust.history().len(), 6);
    }

    #[test]
    fn starts_untrusted_and_climbs() {
        let mut trust = TrustScore::new("writer-agent");
        trust.update(85.0, Outcome::Good, None, None);
        assert_eq!(trust.score(), 1);
        assert_eq!(trust.trust_level(), TrustLevel::Untrusted);
        trust.update(60.0, Outcome::FlaggedReal, None, None);
        assert_eq!(trust.score(), 3);
    }

    #[test]
    fn overconfident_failures_saturate_at_floor() {
        let mut trust = TrustScore::with_bounds(
            "a",
            TrustBounds {
                initial: 5,
                ..Default::default()
            },
        )
        .unwrap();
        for _ in 0..10 {
            let event = trust.update(90.0, Outcome::Bad, None, None);
            assert_eq!(event.delta, -3);
            assert!(trust.score() >= 0);
        }
        assert_eq!(trust.score(), 0);
    }

    #[test]
    fn score_never_leaves_bounds() {
        let bounds = TrustBounds {
            initial: 0,
            min_score: -5,
            max_score: 10,
        };
        let mut trust = TrustScore::with_bounds("a", bounds).unwrap();
        let outcomes = [Outcome::Good, Outcome::FlaggedReal, Outcome::Bad, Outcome::HiddenProblem];
        for step in 0..200 {
            let outcome = outcomes[(step * 7 + step / 3) % outcomes.len()];
            trust.update((step % 101) as f64, outcome, None, None);
            assert!((-5..=10).contains(&trust.score()), "score {}", trust.score());
        }
        for _ in 0..20 {
            trust.update(50.0, Outcome::FlaggedReal, None, None);
        }
        assert_eq!(trust.score(), 10);
    }

    #[test]
    fn trust_level_boundaries() {
        assert_eq!(TrustLevel::from_score(0), TrustLevel::Untrusted);
        assert_eq!(TrustLevel::from_score(30), TrustLevel::Untrusted);
        assert_eq!(TrustLevel::from_score(31), TrustLevel::Supervised);
        assert_eq!(TrustLevel::from_score(60), TrustLevel::Supervised);
        assert_eq!(TrustLevel::from_score(61), TrustLevel::SpotCheck);
        assert_eq!(TrustLevel::from_score(80), TrustLevel::SpotCheck);
        assert_eq!(TrustLevel::from_score(81), TrustLevel::Autonomous);
        assert_eq!(TrustLevel::from_score(-10), TrustLevel::Untrusted);
    }

    #[test]
    fn sample_rates_and_qa_need() {
        assert_eq!(TrustLevel::Untrusted.qa_sample_rate(), 1.0);
        assert_eq!(TrustLevel::Supervised.qa_sample_rate(), 0.5);
        assert_eq!(TrustLevel::SpotCheck.qa_sample_rate(), 0.2);
        assert_eq!(TrustLevel::Autonomous.qa_sample_rate(), 0.0);
        assert!(TrustLevel::Untrusted.needs_qa());
        assert!(TrustLevel::Supervised.needs_qa());
        assert!(!TrustLevel::SpotCheck.needs_qa());
        assert!(!TrustLevel::Autonomous.needs_qa());
    }

    #[test]
    fn unknown_outcome_is_invalid() {
        assert_eq!("flagged_real".parse::<Outcome>().unwrap(), Outcome::FlaggedReal);
        let err = "meh".parse::<Outcome>().unwrap_err();
        assert!(matches!(err, TrustError::InvalidArgument(_)));
    }

    #[test]
    fn reasons_and_timestamps() {
        let mut trust = TrustScore::new("a");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let event = trust.update(95.0, Outcome::Bad, None, Some(at));
        assert_eq!(event.timestamp, at);
        assert!(event.reason.contains("overconfident"));

        let event = trust.update(50.0, Outcome::Good, Some("editor approved"), None);
        assert_eq!(event.reason, "editor approved");

        let event = trust.update(50.0, Outcome::Good, Some(""), None);
        assert_eq!(event.reason, "Good output (stated 50%)");
    }

    #[test]
    fn rejects_inverted_bounds() {
        let bounds = TrustBounds {
            initial: 0,
            min_score: 10,
            max_score: 5,
        };
        assert!(TrustScore::with_bounds("a", bounds).is_err());
    }

    #[test]
    fn ledger_replay_rebuilds_score() {
        let mut trust = TrustScore::with_bounds(
            "a",
            TrustBounds {
                initial: 2,
                ..Default::default()
            },
        )
        .unwrap();
        trust.update(90.0, Outcome::Bad, None, None);
        trust.update(90.0, Outcome::Bad, None, None);
        trust.update(50.0, Outcome::FlaggedReal, None, None);
        assert_eq!(trust.score(), 2);

        let json = serde_json::to_string(&trust.to_ledger()).unwrap();
        let ledger: TrustLedger = serde_json::from_str(&json).unwrap();
        let restored = TrustScore::from_ledger(ledger).unwrap();
        assert_eq!(restored, trust);
    }

    #[test]
    fn summary_reports_current_state() {
        let mut trust = TrustScore::with_bounds(
            "reviewer",
            TrustBounds {
                initial: 60,
                ..Default::default()
            },
        )
        .unwrap();
        trust.update(70.0, Outcome::Good, None, None);

        let summary = trust.summary();
        assert_eq!(summary.agent_id, "reviewer");
        assert_eq!(summary.score, 61);
        assert_eq!(summary.trust_level, TrustLevel::SpotCheck);
        assert_eq!(summary.total_events, 1);
        assert!(!summary.needs_qa);
        assert_eq!(summary.qa_sample_rate, 0.2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["trust_level"], "spot_check");
    }
}
