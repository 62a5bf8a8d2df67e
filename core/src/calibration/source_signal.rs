use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::round_to;
use crate::error::{Result, TrustError};

pub const DEFAULT_ADMIRALTY: &str = "C3";

const SOURCE_WEIGHT: f64 = 0.5;
const CONSISTENCY_WEIGHT: f64 = 0.3;
const STRUCTURAL_WEIGHT: f64 = 0.2;
const STRUCTURAL_CAP: f64 = 0.50;
const UNKNOWN_ADMIRALTY_SCORE: f64 = 0.40;
const UNKNOWN_YEAR_RECENCY: f64 = 0.8;
const RECENCY_FLOOR: f64 = 0.5;
const RECENCY_DECAY_PER_YEAR: f64 = 0.1;

static DOI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdoi:\s*\S+|\b10\.\d{4,9}/\S+").expect("valid doi regex")
});
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhttps?://\S+").expect("valid url regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s?%").expect("valid percentage regex"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year regex"));
static SOURCE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[S\d+\]").expect("valid source reference regex"));

/// NATO Admiralty reliability score for a rating tag. Unknown tags score 0.40.
pub fn admiralty_score(rating: &str) -> f64 {
    match rating.trim().to_ascii_uppercase().as_str() {
        "A1" => 0.95,
        "A2" => 0.85,
        "B2" => 0.70,
        "C3" => 0.40,
        "D4" => 0.20,
        "E2" => 0.10,
        _ => UNKNOWN_ADMIRALTY_SCORE,
    }
}

/// Recency discount: 10% per year of age, floored at 0.5, 0.8 when the
/// evidence year is unknown. Never above 1.0.
pub fn recency(evidence_year: Option<i32>, current_year: i32) -> f64 {
    match evidence_year {
        Some(year) => {
            let age = f64::from(current_year - year);
            (1.0 - age * RECENCY_DECAY_PER_YEAR).clamp(RECENCY_FLOOR, 1.0)
        }
        None => UNKNOWN_YEAR_RECENCY,
    }
}

/// How far a claim has been checked against independent evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    #[default]
    Partial,
    Unverifiable,
    Unknown,
}

impl VerificationStatus {
    /// Lenient parse: anything unrecognized is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "verified" => Self::Verified,
            "partial" => Self::Partial,
            "unverifiable" => Self::Unverifiable,
            _ => Self::Unknown,
        }
    }

    /// Multiplier applied to the source signal.
    pub fn score(&self) -> f64 {
        match self {
            Self::Verified => 1.0,
            Self::Partial | Self::Unknown => 0.5,
            Self::Unverifiable => 0.1,
        }
    }

    /// Cheap stand-in for a full sample-consistency run.
    pub fn consistency_proxy(&self) -> f64 {
        match self {
            Self::Verified => 0.85,
            Self::Partial => 0.60,
            Self::Unverifiable => 0.30,
            Self::Unknown => 0.40,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Partial => "partial",
            Self::Unverifiable => "unverifiable",
            Self::Unknown => "unknown",
        }
    }
}

/// Deterministic textual markers that make a claim checkable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralMarkers {
    pub has_doi: bool,
    pub has_url: bool,
    pub has_percentage: bool,
    pub has_year: bool,
    /// Inline reference marker such as `[S3]`.
    pub has_source_ref: bool,
}

impl StructuralMarkers {
    /// Scan claim text for markers.
    pub fn detect(text: &str) -> Self {
        Self {
            has_doi: DOI_RE.is_match(text),
            has_url: URL_RE.is_match(text),
            has_percentage: PERCENT_RE.is_match(text),
            has_year: YEAR_RE.is_match(text),
            has_source_ref: SOURCE_REF_RE.is_match(text),
        }
    }

    /// Sum of marker points, capped at 0.50.
    pub fn signal(&self) -> f64 {
        let points = [
            (self.has_doi, 0.30),
            (self.has_url, 0.15),
            (self.has_percentage, 0.10),
            (self.has_year, 0.05),
            (self.has_source_ref, 0.10),
        ];
        let total: f64 = points
            .iter()
            .filter(|(present, _)| *present)
            .map(|(_, value)| value)
            .sum();
        total.min(STRUCTURAL_CAP)
    }
}

/// Everything known about the evidence behind one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEvidence {
    pub claim: String,
    /// Admiralty rating tag, e.g. "A1" or "C3".
    pub admiralty: String,
    pub verification: VerificationStatus,
    pub evidence_year: Option<i32>,
    pub current_year: i32,
    pub markers: StructuralMarkers,
}

impl ClaimEvidence {
    /// Evidence with defaults: rating C3, partially verified, unknown year,
    /// no markers, current year from the clock.
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            admiralty: DEFAULT_ADMIRALTY.to_string(),
            verification: VerificationStatus::default(),
            evidence_year: None,
            current_year: Utc::now().year(),
            markers: StructuralMarkers::default(),
        }
    }

    pub fn with_admiralty(mut self, rating: impl Into<String>) -> Self {
        self.admiralty = rating.into();
        self
    }

    pub fn with_verification(mut self, verification: VerificationStatus) -> Self {
        self.verification = verification;
        self
    }

    pub fn with_evidence_year(mut self, year: i32) -> Self {
        self.evidence_year = Some(year);
        self
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn with_markers(mut self, markers: StructuralMarkers) -> Self {
        self.markers = markers;
        self
    }

    /// Replace the markers with the ones found in the claim text.
    pub fn with_detected_markers(mut self) -> Self {
        self.markers = StructuralMarkers::detect(&self.claim);
        self
    }
}

/// Claim-level confidence from the three-signal formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSignalResult {
    pub claim: String,
    pub source_signal: f64,
    pub consistency_signal: f64,
    pub structural_signal: f64,
    pub confidence_pct: f64,
    pub admiralty: String,
}

/// `0.5 * source + 0.3 * consistency + 0.2 * structural`, as a percentage.
///
/// The source signal is `admiralty * verification * recency`; consistency is
/// the verification proxy; structural is the capped marker sum.
pub fn source_signal_confidence(evidence: &ClaimEvidence) -> SourceSignalResult {
    let source = admiralty_score(&evidence.admiralty)
        * evidence.verification.score()
        * recency(evidence.evidence_year, evidence.current_year);
    let consistency = evidence.verification.consistency_proxy();
    let structural = evidence.markers.signal();

    let confidence =
        SOURCE_WEIGHT * source + CONSISTENCY_WEIGHT * consistency + STRUCTURAL_WEIGHT * structural;

    SourceSignalResult {
        claim: evidence.claim.clone(),
        source_signal: round_to(source, 4),
        consistency_signal: round_to(consistency, 4),
        structural_signal: round_to(structural, 4),
        confidence_pct: round_to(confidence * 100.0, 1),
        admiralty: evidence.admiralty.clone(),
    }
}

/// Weighted mean of claim confidences for a whole report.
///
/// `weights` defaults to uniform. Suggested weights: load-bearing 1.0,
/// supporting 0.6, contextual 0.3. Returns 0 for no claims or zero total
/// weight; fails with `InvalidArgument` when the lengths differ.
pub fn report_confidence(results: &[SourceSignalResult], weights: Option<&[f64]>) -> Result<f64> {
    if results.is_empty() {
        return Ok(0.0);
    }

    let uniform;
    let weights: &[f64] = match weights {
        Some(weights) => weights,
        None => {
            uniform = vec![1.0; results.len()];
            uniform.as_slice()
        }
    };
    if weights.len() != results.len() {
        return Err(TrustError::invalid(format!(
            "weights length {} does not match {} claim results",
            weights.len(),
            results.len()
        )));
    }

    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return Ok(0.0);
    }

    let weighted: f64 = results
        .iter()
        .zip(weights)
        .map(|(result, weight)| result.confidence_pct * weight)
        .sum();
    Ok(round_to(weighted / total_weight, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn strong_verified_claim() {
        let evidence = ClaimEvidence::new("ECE averages 27.3%")
            .with_admiralty("A1")
            .with_verification(VerificationStatus::Verified)
            .with_current_year(2026)
            .with_markers(StructuralMarkers {
                has_doi: true,
                has_percentage: true,
                ..Default::default()
            });

        let result = source_signal_confidence(&evidence);
        // source 0.95 * 1.0 * 0.8, consistency 0.85, structural 0.40
        assert!(close(result.source_signal, 0.76));
        assert!(close(result.consistency_signal, 0.85));
        assert!(close(result.structural_signal, 0.4));
        assert!(close(result.confidence_pct, 71.5));
        assert_eq!(result.admiralty, "A1");
    }

    #[test]
    fn defaults_apply_to_unknown_rating_and_status() {
        let evidence = ClaimEvidence::new("claim")
            .with_admiralty("Z9")
            .with_verification(VerificationStatus::parse("rumoured"));

        let result = source_signal_confidence(&evidence);
        // 0.40 * 0.5 * 0.8 = 0.16, consistency 0.40, structural 0
        assert!(close(result.source_signal, 0.16));
        assert!(close(result.consistency_signal, 0.4));
        assert!(close(result.confidence_pct, 20.0));
    }

    #[test]
    fn recency_decays_and_floors() {
        assert!(close(recency(Some(2026), 2026), 1.0));
        assert!(close(recency(Some(2023), 2026), 0.7));
        assert!(close(recency(Some(2001), 2026), 0.5));
        assert!(close(recency(None, 2026), 0.8));
        assert!(close(recency(Some(2028), 2026), 1.0));
    }

    #[test]
    fn structural_signal_is_capped() {
        let all = StructuralMarkers {
            has_doi: true,
            has_url: true,
            has_percentage: true,
            has_year: true,
            has_source_ref: true,
        };
        assert!(close(all.signal(), 0.5));
        assert!(close(StructuralMarkers::default().signal(), 0.0));
    }

    #[test]
    fn detects_markers_in_text() {
        let markers = StructuralMarkers::detect(
            "Overconfidence in 84% of cases (2025) [S2], see https://example.org and doi:10.1234/abc",
        );
        assert!(markers.has_doi);
        assert!(markers.has_url);
        assert!(markers.has_percentage);
        assert!(markers.has_year);
        assert!(markers.has_source_ref);

        let bare = StructuralMarkers::detect("The sky is blue.");
        assert_eq!(bare, StructuralMarkers::default());
    }

    #[test]
    fn report_confidence_weights_claims() {
        let strong = source_signal_confidence(
            &ClaimEvidence::new("a")
                .with_admiralty("A1")
                .with_verification(VerificationStatus::Verified)
                .with_current_year(2026)
                .with_markers(StructuralMarkers {
                    has_doi: true,
                    ..Default::default()
                }),
        );
        let weak = source_signal_confidence(&ClaimEvidence::new("b").with_current_year(2026));

        // strong: 0.5*0.76 + 0.3*0.85 + 0.2*0.3 = 69.5; weak: 0.5*0.16 + 0.3*0.6 = 26.0
        assert!(close(strong.confidence_pct, 69.5));
        assert!(close(weak.confidence_pct, 26.0));

        let uniform = report_confidence(&[strong.clone(), weak.clone()], None).unwrap();
        assert!(close(uniform, 47.8));

        let weighted = report_confidence(&[strong, weak], Some(&[1.0, 0.6])).unwrap();
        assert!(close(weighted, 53.2));
    }

    #[test]
    fn report_confidence_edge_cases() {
        assert_eq!(report_confidence(&[], None).unwrap(), 0.0);

        let one = source_signal_confidence(&ClaimEvidence::new("a"));
        assert_eq!(report_confidence(&[one.clone()], Some(&[0.0])).unwrap(), 0.0);

        let err = report_confidence(&[one], Some(&[1.0, 1.0])).unwrap_err();
        assert!(matches!(err, TrustError::InvalidArgument(_)));
    }
}
