//! Eight-dimension quality rubric for reviewing agent output.
//!
//! Each dimension scores 0 (missing or flawed), 1 (present but incomplete)
//! or 2 (solid), for a maximum of 16. Pass thresholds depend on the tier:
//! quick lookups need 10, standard briefs 12, deep dives 14.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

pub const MAX_DIMENSION_SCORE: u8 = 2;
pub const MAX_TOTAL: u8 = 16;

/// One rubric dimension with its scoring guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub score_0: &'static str,
    pub score_1: &'static str,
    pub score_2: &'static str,
}

pub static DIMENSIONS: [Dimension; 8] = [
    Dimension {
        id: "accuracy",
        name: "Factual Accuracy",
        description: "Claims are correct and verifiable. No hallucinations.",
        score_0: "Contains factual errors or unverifiable claims",
        score_1: "Mostly accurate, minor issues or unverified claims",
        score_2: "All claims accurate and verifiable",
    },
    Dimension {
        id: "completeness",
        name: "Completeness",
        description: "Covers the topic adequately. No major gaps.",
        score_0: "Major aspects missing",
        score_1: "Covers basics but misses important nuances",
        score_2: "Comprehensive coverage appropriate for the task",
    },
    Dimension {
        id: "sources",
        name: "Source Quality",
        description: "Sources are cited, relevant, and accessible.",
        score_0: "No sources or irrelevant sources",
        score_1: "Some sources but gaps in citation or relevance",
        score_2: "Well-sourced with relevant, accessible references",
    },
    Dimension {
        id: "clarity",
        name: "Clarity & Structure",
        description: "Well-organized, easy to follow, appropriate format.",
        score_0: "Disorganized or hard to follow",
        score_1: "Readable but could be better structured",
        score_2: "Clear, well-structured, appropriate format",
    },
    Dimension {
        id: "honesty",
        name: "Epistemic Honesty",
        description: "Distinguishes evidence from interpretation. Flags uncertainty.",
        score_0: "Presents speculation as fact, no uncertainty flagged",
        score_1: "Some distinction but blurs evidence and interpretation",
        score_2: "Clear separation of evidence, interpretation, and judgment",
    },
    Dimension {
        id: "actionability",
        name: "Actionability",
        description: "Output leads to clear next steps or decisions.",
        score_0: "No actionable takeaways",
        score_1: "Some actionable content but vague",
        score_2: "Clear, specific, actionable recommendations",
    },
    Dimension {
        id: "calibration",
        name: "Confidence Calibration",
        description: "Stated confidence matches actual quality. Beipackzettel present.",
        score_0: "No confidence stated or wildly miscalibrated",
        score_1: "Confidence stated but over/underconfident",
        score_2: "Confidence well-calibrated, Beipackzettel complete",
    },
    Dimension {
        id: "risks",
        name: "Risk Awareness",
        description: "Known risks, limitations, and failure modes are flagged.",
        score_0: "No risks mentioned despite obvious ones",
        score_1: "Some risks flagged but incomplete",
        score_2: "Comprehensive risk awareness",
    },
];

/// Look up a dimension by id.
pub fn dimension(id: &str) -> Option<&'static Dimension> {
    DIMENSIONS.iter().find(|d| d.id == id)
}

/// Review depth. Deeper tiers demand a higher total to pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Quick = 1,
    #[default]
    Standard = 2,
    Deep = 3,
}

impl Tier {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Minimum total for a PASS.
    pub fn pass_threshold(&self) -> u8 {
        match self {
            Self::Quick => 10,
            Self::Standard => 12,
            Self::Deep => 14,
        }
    }

    /// Minimum total for a REVISE; anything lower fails outright.
    pub fn revise_floor(&self) -> u8 {
        self.number() * 4
    }
}

impl TryFrom<u8> for Tier {
    type Error = TrustError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Quick),
            2 => Ok(Self::Standard),
            3 => Ok(Self::Deep),
            other => Err(TrustError::invalid(format!(
                "tier must be 1, 2 or 3, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

impl Serialize for Tier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Tier::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Validated per-dimension scores. The total is always the sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RubricScore {
    scores: BTreeMap<&'static str, u8>,
    total: u8,
    max_total: u8,
}

impl RubricScore {
    pub fn scores(&self) -> &BTreeMap<&'static str, u8> {
        &self.scores
    }

    pub fn score(&self, id: &str) -> Option<u8> {
        self.scores.get(id).copied()
    }

    pub fn total(&self) -> u8 {
        self.total
    }

    pub fn max_total(&self) -> u8 {
        self.max_total
    }

    pub fn passes(&self, tier: Tier) -> bool {
        self.total >= tier.pass_threshold()
    }

    /// Dimension ids that scored 0, in rubric order.
    pub fn weakest(&self) -> Vec<&'static str> {
        DIMENSIONS
            .iter()
            .map(|d| d.id)
            .filter(|id| self.scores.get(id) == Some(&0))
            .collect()
    }
}

/// Build a rubric score from `(dimension id, score)` pairs.
///
/// Every one of the eight dimensions must appear exactly once with a score in
/// `{0, 1, 2}`; anything else is `InvalidArgument`.
pub fn create_rubric_score<I, S>(scores: I) -> Result<RubricScore>
where
    I: IntoIterator<Item = (S, i64)>,
    S: AsRef<str>,
{
    let mut validated = BTreeMap::new();
    for (id, score) in scores {
        let id = id.as_ref();
        let dim = dimension(id)
            .ok_or_else(|| TrustError::invalid(format!("unknown dimension: '{id}'")))?;
        let score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= MAX_DIMENSION_SCORE)
            .ok_or_else(|| {
                TrustError::invalid(format!("score must be 0-2, got {score} for '{id}'"))
            })?;
        if validated.insert(dim.id, score).is_some() {
            return Err(TrustError::invalid(format!("dimension '{id}' scored twice")));
        }
    }

    if let Some(missing) = DIMENSIONS.iter().find(|d| !validated.contains_key(d.id)) {
        return Err(TrustError::invalid(format!(
            "missing score for dimension '{}'",
            missing.id
        )));
    }

    let total: u8 = validated.values().sum();
    Ok(RubricScore {
        scores: validated,
        total,
        max_total: MAX_TOTAL,
    })
}
