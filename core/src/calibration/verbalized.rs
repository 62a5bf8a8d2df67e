use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::round_to;
use crate::error::{Result, TrustError};

/// Self-reported confidence overshoots by roughly 30%.
pub const DEFAULT_DISCOUNT: f64 = 0.7;

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:confidence|confident|certainty|sure)[\s:]*(\d{1,3})\s*%")
        .expect("valid confidence statement regex")
});

/// A stated confidence and its discounted counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerbalizedConfidence {
    pub raw_text: String,
    /// What the text claimed, clamped to `[0, 100]`.
    pub stated_confidence: f64,
    pub calibrated_confidence: f64,
    pub discount_factor: f64,
}

/// Extract a stated confidence like "confidence: 85%" and discount it.
///
/// Fails with `InvalidArgument` unless `discount` is in `(0, 1]`, and with
/// `NotFound` when the text carries no confidence statement.
pub fn verbalized_confidence(text: &str, discount: f64) -> Result<VerbalizedConfidence> {
    if !(discount > 0.0 && discount <= 1.0) {
        return Err(TrustError::invalid(format!(
            "discount must be in (0, 1], got {discount}"
        )));
    }

    let stated = CONFIDENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| {
            TrustError::NotFound("no confidence statement in text".to_string())
        })?
        .clamp(0.0, 100.0);

    Ok(VerbalizedConfidence {
        raw_text: text.to_string(),
        stated_confidence: stated,
        calibrated_confidence: round_to(stated * discount, 1),
        discount_factor: discount,
    })
}
