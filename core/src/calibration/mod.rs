//! Confidence calibration for agent outputs.
//!
//! Three independent methods, picked by the caller on cost versus accuracy:
//!
//! - [`sample_consistency`]: ask the same question several times and measure
//!   agreement. The strongest signal, and the most expensive one.
//! - [`source_signal_confidence`]: deterministic blend of source quality, a
//!   verification-based consistency proxy, and structural text markers. No
//!   model calls at all.
//! - [`verbalized_confidence`]: parse a self-reported "confidence: 85%" and
//!   discount it for overconfidence. A fallback, never a primary source.
//!
//! All functions here are pure apart from the answerer they are handed.

mod consistency;
mod source_signal;
mod verbalized;

pub use consistency::{
    Answerer, CalibrationResult, ConfidenceLevel, DEFAULT_SAMPLES, normalize_answer,
    sample_consistency,
};
pub use source_signal::{
    ClaimEvidence, DEFAULT_ADMIRALTY, SourceSignalResult, StructuralMarkers, VerificationStatus,
    admiralty_score, recency, report_confidence, source_signal_confidence,
};
pub use verbalized::{DEFAULT_DISCOUNT, VerbalizedConfidence, verbalized_confidence};

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
