use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::round_to;
use crate::error::{BoxError, Result, TrustError};

/// Three samples is the budget sweet spot between cost and signal.
pub const DEFAULT_SAMPLES: usize = 3;

const PCT_FLOOR: f64 = 30.0;
const PCT_CEILING: f64 = 95.0;
const PCT_SLOPE: f64 = 55.0;

static TRAILING_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?,;:]+$").expect("valid trailing punctuation regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Anything that answers a query. Each call must be independent of the last
/// (no shared conversation history), otherwise agreement means nothing.
pub trait Answerer {
    fn answer(&mut self, query: &str) -> std::result::Result<String, BoxError>;
}

impl<F> Answerer for F
where
    F: FnMut(&str) -> std::result::Result<String, BoxError>,
{
    fn answer(&mut self, query: &str) -> std::result::Result<String, BoxError> {
        self(query)
    }
}

/// Discrete confidence derived from sample agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// Every sample agrees.
    High,
    /// At least two thirds agree.
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 1.0 {
            Self::High
        } else if ratio >= 2.0 / 3.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Outcome of one consistency check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub query: String,
    /// Raw answers in call order, before normalization.
    pub samples: Vec<String>,
    /// Share of samples matching the most common normalized answer.
    pub agreement_ratio: f64,
    pub confidence_level: ConfidenceLevel,
    /// Always within `[30, 95]`: agreement alone never proves or disproves an answer.
    pub confidence_pct: f64,
    /// Most common normalized answer, `None` when every answer differs.
    pub majority_answer: Option<String>,
}

/// Normalize an answer for comparison: trim, lowercase, drop trailing
/// punctuation, collapse whitespace.
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let stripped = TRAILING_PUNCT_RE.replace(&lowered, "");
    WHITESPACE_RE.replace_all(&stripped, " ").into_owned()
}

/// Ask `query` `n` times and measure how much the answers agree.
///
/// Fails with `InvalidArgument` when `n < 2`. Answerer errors abort the check
/// and are returned as `TrustError::Answerer`.
pub fn sample_consistency<A>(answerer: &mut A, query: &str, n: usize) -> Result<CalibrationResult>
where
    A: Answerer + ?Sized,
{
    if n < 2 {
        return Err(TrustError::invalid(format!(
            "need at least 2 samples for a consistency check, got {n}"
        )));
    }

    let mut samples = Vec::with_capacity(n);
    for _ in 0..n {
        let answer = answerer.answer(query).map_err(TrustError::Answerer)?;
        samples.push(answer);
    }

    let (top_answer, top_count) = most_common(&samples);
    let ratio = top_count as f64 / n as f64;
    let majority_answer = (top_count > 1).then_some(top_answer);
    let confidence_level = ConfidenceLevel::from_ratio(ratio);
    let confidence_pct = round_to(PCT_FLOOR + ratio * PCT_SLOPE, 1).clamp(PCT_FLOOR, PCT_CEILING);

    tracing::debug!(
        query,
        samples = n,
        agreement_ratio = ratio,
        confidence_level = confidence_level.as_str(),
        confidence_pct,
        "sample consistency computed"
    );

    Ok(CalibrationResult {
        query: query.to_string(),
        samples,
        agreement_ratio: round_to(ratio, 4),
        confidence_level,
        confidence_pct,
        majority_answer,
    })
}

/// Most frequent normalized answer and its count. Ties go to the answer seen first.
fn most_common(samples: &[String]) -> (String, usize) {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for sample in samples {
        let normalized = normalize_answer(sample);
        match counts.iter_mut().find(|(answer, _)| *answer == normalized) {
            Some((_, count)) => *count += 1,
            None => counts.push((normalized, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (answer, count) in counts {
        if best.as_ref().is_none_or(|(_, top)| count > *top) {
            best = Some((answer, count));
        }
    }
    best.unwrap_or_default()
}
