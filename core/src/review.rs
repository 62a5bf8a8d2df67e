//! Adversarial review: score an output against the rubric and decide
//! whether it ships, goes back for revision, or is rejected.

use std::fmt;

use serde::Serialize;

use crate::error::{BoxError, Result, TrustError};
use crate::rubric::{DIMENSIONS, Dimension, MAX_DIMENSION_SCORE, RubricScore, Tier, create_rubric_score};

/// Scores one output on one rubric dimension.
///
/// Implementations return any integer; the reviewer clamps it into `[0, 2]`.
pub trait DimensionScorer {
    fn score(&self, output: &str, dimension: &Dimension) -> std::result::Result<i64, BoxError>;
}

impl<F> DimensionScorer for F
where
    F: Fn(&str, &Dimension) -> std::result::Result<i64, BoxError>,
{
    fn score(&self, output: &str, dimension: &Dimension) -> std::result::Result<i64, BoxError> {
        self(output, dimension)
    }
}

/// Review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    /// Below the pass threshold but fixable.
    Revise,
    Fail,
}

impl Verdict {
    /// PASS at the tier threshold, REVISE down to `tier * 4`, FAIL below.
    pub fn for_total(total: u8, tier: Tier) -> Self {
        if total >= tier.pass_threshold() {
            Self::Pass
        } else if total >= tier.revise_floor() {
            Self::Revise
        } else {
            Self::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Revise => "REVISE",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete review of one output. The verdict is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    rubric_score: RubricScore,
    issues: Vec<String>,
    verdict: Verdict,
    tier: Tier,
    notes: String,
}

impl ReviewResult {
    pub fn new(rubric_score: RubricScore, issues: Vec<String>, tier: Tier) -> Self {
        let verdict = Verdict::for_total(rubric_score.total(), tier);
        Self {
            rubric_score,
            issues,
            verdict,
            tier,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn rubric_score(&self) -> &RubricScore {
        &self.rubric_score
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}

/// Score `output` on all eight dimensions and derive a verdict.
///
/// Scores are clamped into `[0, 2]`. Every zero is recorded as an issue built
/// from the dimension's `score_0` guide. Scorer errors abort the review.
pub fn review<S>(output: &str, scorer: &S, tier: Tier) -> Result<ReviewResult>
where
    S: DimensionScorer + ?Sized,
{
    let mut scores = Vec::with_capacity(DIMENSIONS.len());
    let mut issues = Vec::new();

    for dim in &DIMENSIONS {
        let raw = scorer
            .score(output, dim)
            .map_err(|source| TrustError::Scorer {
                dimension: dim.id,
                source,
            })?;
        let score = raw.clamp(0, i64::from(MAX_DIMENSION_SCORE));
        if score == 0 {
            issues.push(format!("{}: {}", dim.name, dim.score_0));
        }
        scores.push((dim.id, score));
    }

    let rubric_score = create_rubric_score(scores)?;
    let result = ReviewResult::new(rubric_score, issues, tier);
    tracing::debug!(
        total = result.rubric_score().total(),
        tier = tier.number(),
        verdict = result.verdict().as_str(),
        issues = result.issues().len(),
        "review scored"
    );
    Ok(result)
}

/// Reviewer bound to a scorer and tier, as used by the pipeline.
pub struct Reviewer {
    scorer: Box<dyn DimensionScorer + Send>,
    tier: Tier,
}

impl Reviewer {
    /// Reviewer using the built-in [`HeuristicScorer`].
    pub fn new(tier: Tier) -> Self {
        Self {
            scorer: Box::new(HeuristicScorer),
            tier,
        }
    }

    pub fn with_scorer<S>(mut self, scorer: S) -> Self
    where
        S: DimensionScorer + Send + 'static,
    {
        self.scorer = Box::new(scorer);
        self
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn review(&self, output: &str) -> Result<ReviewResult> {
        review(output, self.scorer.as_ref(), self.tier)
    }
}

impl Default for Reviewer {
    fn default() -> Self {
        Self::new(Tier::default())
    }
}

impl fmt::Debug for Reviewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reviewer").field("tier", &self.tier).finish_non_exhaustive()
    }
}

/// Placeholder scorer that counts textual markers per dimension.
///
/// Keeps the pipeline runnable without a real judge. It cannot check facts,
/// so accuracy always gets the benefit of the doubt. Production deployments
/// should plug in a model-backed scorer instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    fn score_dimension(output: &str, dimension_id: &str) -> i64 {
        let text = output.to_lowercase();
        let hits = |markers: &[&str]| markers.iter().filter(|m| text.contains(*m)).count() as i64;

        match dimension_id {
            "accuracy" => 1,
            "completeness" => match output.chars().count() {
                0..50 => 0,
                50..200 => 1,
                _ => 2,
            },
            "sources" => match hits(&["http", "arxiv", "doi", "source:", "reference"]) {
                0 => 0,
                1 => 1,
                _ => 2,
            },
            "clarity" => hits(&["\n\n", "##", "- ", "1.", "key takeaway"]).min(2),
            "honesty" => hits(&["uncertain", "might", "unclear", "not sure", "assumption"]).min(2),
            "actionability" => hits(&["recommend", "next step", "should", "action", "todo"]).min(2),
            "calibration" => {
                if text.contains("confidence:") || text.contains("% confident") {
                    if text.contains("beipackzettel") { 2 } else { 1 }
                } else {
                    0
                }
            }
            "risks" => hits(&["risk", "caveat", "limitation", "warning", "might fail"]).min(2),
            _ => 1,
        }
    }
}

impl DimensionScorer for HeuristicScorer {
    fn score(&self, output: &str, dimension: &Dimension) -> std::result::Result<i64, BoxError> {
        Ok(Self::score_dimension(output, dimension.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(score: i64) -> impl Fn(&str, &Dimension) -> std::result::Result<i64, BoxError> {
        move |_output: &str, _dim: &Dimension| Ok(score)
    }

    /// Scorer that gives 2 to the first `twos` dimensions, 1 to the next `ones`, 0 after.
    fn shaped(twos: usize, ones: usize) -> impl Fn(&str, &Dimension) -> std::result::Result<i64, BoxError> {
        move |_output: &str, dim: &Dimension| {
            let index = DIMENSIONS.iter().position(|d| d.id == dim.id).unwrap_or(0);
            Ok(if index < twos {
                2
            } else if index < twos + ones {
                1
            } else {
                0
            })
        }
    }

    #[test]
    fn perfect_scores_pass_every_tier() {
        for tier in [Tier::Quick, Tier::Standard, Tier::Deep] {
            let result = review("anything", &constant(2), tier).unwrap();
            assert_eq!(result.rubric_score().total(), 16);
            assert_eq!(result.verdict(), Verdict::Pass);
            assert!(result.issues().is_empty());
        }
    }

    #[test]
    fn tier_two_boundaries() {
        // 12: four 2s and four 1s
        let twelve = review("x", &shaped(4, 4), Tier::Standard).unwrap();
        assert_eq!(twelve.rubric_score().total(), 12);
        assert_eq!(twelve.verdict(), Verdict::Pass);

        // 11: three 2s and five 1s
        let eleven = review("x", &shaped(3, 5), Tier::Standard).unwrap();
        assert_eq!(eleven.rubric_score().total(), 11);
        assert_eq!(eleven.verdict(), Verdict::Revise);

        // 8: revise floor for tier 2
        let eight = review("x", &constant(1), Tier::Standard).unwrap();
        assert_eq!(eight.rubric_score().total(), 8);
        assert_eq!(eight.verdict(), Verdict::Revise);

        // 7: one 0 among seven 1s
        let seven = review("x", &shaped(0, 7), Tier::Standard).unwrap();
        assert_eq!(seven.rubric_score().total(), 7);
        assert_eq!(seven.verdict(), Verdict::Fail);
    }

    #[test]
    fn verdict_for_total_per_tier() {
        assert_eq!(Verdict::for_total(10, Tier::Quick), Verdict::Pass);
        assert_eq!(Verdict::for_total(9, Tier::Quick), Verdict::Revise);
        assert_eq!(Verdict::for_total(4, Tier::Quick), Verdict::Revise);
        assert_eq!(Verdict::for_total(3, Tier::Quick), Verdict::Fail);
        assert_eq!(Verdict::for_total(14, Tier::Deep), Verdict::Pass);
        assert_eq!(Verdict::for_total(13, Tier::Deep), Verdict::Revise);
        assert_eq!(Verdict::for_total(12, Tier::Deep), Verdict::Revise);
        assert_eq!(Verdict::for_total(11, Tier::Deep), Verdict::Fail);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let result = review("x", &constant(7), Tier::Standard).unwrap();
        assert_eq!(result.rubric_score().total(), 16);

        let result = review("x", &constant(-3), Tier::Standard).unwrap();
        assert_eq!(result.rubric_score().total(), 0);
        assert_eq!(result.verdict(), Verdict::Fail);
    }

    #[test]
    fn zero_scores_become_issues() {
        let result = review("x", &shaped(7, 0), Tier::Standard).unwrap();
        assert_eq!(result.issues(), ["Risk Awareness: No risks mentioned despite obvious ones"]);
    }

    #[test]
    fn scorer_errors_propagate() {
        let failing = |_output: &str, dim: &Dimension| -> std::result::Result<i64, BoxError> {
            if dim.id == "sources" {
                Err("judge timed out".into())
            } else {
                Ok(2)
            }
        };
        let err = review("x", &failing, Tier::Standard).unwrap_err();
        match err {
            TrustError::Scorer { dimension, .. } => assert_eq!(dimension, "sources"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn heuristic_scores_a_thin_answer_low() {
        let result = Reviewer::default().review("Paris.").unwrap();
        // accuracy is the only dimension with a free point
        assert_eq!(result.rubric_score().total(), 1);
        assert_eq!(result.verdict(), Verdict::Fail);
        assert_eq!(result.issues().len(), 7);
    }

    #[test]
    fn heuristic_rewards_a_well_formed_brief() {
        let output = "## Research: calibration\n\n\
            - Source: https://arxiv.org/abs/2506.04133\n\
            - Reference: doi:10.1234/example\n\n\
            1. We recommend sample consistency as the next step.\n\
            This might not generalize and remains uncertain.\n\
            Confidence: 72%\nBeipackzettel: attached.\n\
            Risk: coverage limitation in non-English sources.";
        let result = Reviewer::new(Tier::Standard).review(output).unwrap();
        assert_eq!(result.rubric_score().score("accuracy"), Some(1));
        assert_eq!(result.rubric_score().score("completeness"), Some(2));
        assert_eq!(result.rubric_score().score("sources"), Some(2));
        assert_eq!(result.rubric_score().score("clarity"), Some(2));
        assert_eq!(result.rubric_score().score("honesty"), Some(2));
        assert_eq!(result.rubric_score().score("actionability"), Some(2));
        assert_eq!(result.rubric_score().score("calibration"), Some(2));
        assert_eq!(result.rubric_score().score("risks"), Some(2));
        assert_eq!(result.verdict(), Verdict::Pass);
    }
}
