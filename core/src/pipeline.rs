//! Trust-gated delivery: execute, review, deliver.
//!
//! ```text
//! EXECUTE ──> (review?) ──> REVIEW ──> PASS ──────────────> DELIVER
//!    ^            │                ├─> FAIL / last try ───> REJECT
//!    │            │ no             └─> REVISE ──> RETRY ─┐
//!    │            └──────────────────────────> DELIVER   │
//!    └───────────────────────────────────────────────────┘
//! ```
//!
//! The trust score is updated once per run, and only when a review decided
//! the outcome: "good" on PASS, "bad" on REJECT. Retries and unreviewed
//! deliveries leave it alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::beipackzettel::Beipackzettel;
use crate::error::{BoxError, Result, TrustError};
use crate::review::{DimensionScorer, ReviewResult, Reviewer, Verdict};
use crate::rubric::Tier;
use crate::shared::SharedTrustScore;
use crate::trust::{Outcome, TrustEvent};

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// What an agent hands back: the output and its package insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutput {
    pub output: String,
    pub beipackzettel: Beipackzettel,
}

impl AgentOutput {
    pub fn new(output: impl Into<String>, beipackzettel: Beipackzettel) -> Self {
        Self {
            output: output.into(),
            beipackzettel,
        }
    }
}

/// The agent under supervision, treated as a black box.
///
/// It may be called again with the same query on RETRY.
pub trait Agent {
    fn execute(&mut self, query: &str) -> std::result::Result<AgentOutput, BoxError>;
}

impl<F> Agent for F
where
    F: FnMut(&str) -> std::result::Result<AgentOutput, BoxError>,
{
    fn execute(&mut self, query: &str) -> std::result::Result<AgentOutput, BoxError> {
        self(query)
    }
}

/// How the QA sample rate turns into a review decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Review whenever the rate is above zero.
    Always,
    /// Review with probability equal to the rate.
    #[default]
    Sampled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tier: Tier,
    pub max_iterations: u32,
    pub sampling: SamplingPolicy,
    /// Seed for spot-check sampling; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sampling: SamplingPolicy::default(),
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(TrustError::invalid("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub output: String,
    pub beipackzettel: Beipackzettel,
    /// `None` when review was skipped for this run.
    pub review_result: Option<ReviewResult>,
    pub delivered: bool,
    /// Execute cycles consumed, at least 1.
    pub iterations: u32,
    /// The trust update this run caused, if any.
    pub trust_event: Option<TrustEvent>,
}

/// Wraps an agent with review gating and trust tracking.
pub struct AgentPipeline<A> {
    agent: A,
    trust: SharedTrustScore,
    reviewer: Reviewer,
    max_iterations: u32,
    sampling: SamplingPolicy,
    rng: StdRng,
}

impl<A: Agent> AgentPipeline<A> {
    /// Pipeline reviewing with the built-in heuristic scorer.
    pub fn new(agent: A, trust: SharedTrustScore, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            agent,
            trust,
            reviewer: Reviewer::new(config.tier),
            max_iterations: config.max_iterations,
            sampling: config.sampling,
            rng,
        })
    }

    /// Swap in a different dimension scorer, e.g. a model-backed judge.
    pub fn with_scorer<S>(mut self, scorer: S) -> Self
    where
        S: DimensionScorer + Send + 'static,
    {
        self.reviewer = Reviewer::new(self.reviewer.tier()).with_scorer(scorer);
        self
    }

    pub fn trust(&self) -> &SharedTrustScore {
        &self.trust
    }

    /// Run the loop for `query` until the output is delivered or rejected.
    ///
    /// Agent and scorer errors end the run immediately and are returned
    /// unchanged. A rejected output is an `Ok` result with `delivered: false`.
    pub fn run(&mut self, query: &str) -> Result<PipelineResult> {
        let mut iteration = 0;
        loop {
            iteration += 1;
            let AgentOutput {
                output,
                beipackzettel,
            } = self.agent.execute(query).map_err(TrustError::Agent)?;

            let rate = self.trust.qa_sample_rate();
            if !self.should_review(rate) {
                tracing::info!(iteration, qa_sample_rate = rate, "delivering without review");
                return Ok(PipelineResult {
                    output,
                    beipackzettel,
                    review_result: None,
                    delivered: true,
                    iterations: iteration,
                    trust_event: None,
                });
            }

            let review = self.reviewer.review(&output)?;
            let verdict = review.verdict();
            let confidence = beipackzettel.confidence();

            if verdict == Verdict::Pass {
                let event = self.trust.update(confidence, Outcome::Good, None, None);
                tracing::info!(
                    iteration,
                    total = review.rubric_score().total(),
                    "review passed, delivering"
                );
                return Ok(PipelineResult {
                    output,
                    beipackzettel,
                    review_result: Some(review),
                    delivered: true,
                    iterations: iteration,
                    trust_event: Some(event),
                });
            }

            if verdict == Verdict::Fail || iteration >= self.max_iterations {
                let event = self.trust.update(confidence, Outcome::Bad, None, None);
                tracing::warn!(
                    iteration,
                    verdict = verdict.as_str(),
                    total = review.rubric_score().total(),
                    issues = review.issues().len(),
                    "output rejected"
                );
                return Ok(PipelineResult {
                    output,
                    beipackzettel,
                    review_result: Some(review),
                    delivered: false,
                    iterations: iteration,
                    trust_event: Some(event),
                });
            }

            tracing::info!(
                iteration,
                total = review.rubric_score().total(),
                remaining = self.max_iterations - iteration,
                "revision requested, retrying"
            );
        }
    }

    fn should_review(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        match self.sampling {
            SamplingPolicy::Always => true,
            SamplingPolicy::Sampled => self.rng.gen_bool(rate.min(1.0)),
        }
    }
}
