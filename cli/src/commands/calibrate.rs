use agenttrust_core::TrustError;
use agenttrust_core::calibration::{
    ClaimEvidence, DEFAULT_ADMIRALTY, DEFAULT_DISCOUNT, DEFAULT_SAMPLES, SourceSignalResult,
    VerificationStatus, report_confidence, sample_consistency, source_signal_confidence,
    verbalized_confidence,
};
use clap::{Args, Subcommand};
use serde::Deserialize;
use serde_json::json;

use crate::Context;
use crate::provider::ChatClient;
use crate::util::{exit_error, print_json, read_json_from_file, read_text_from_file, report_error, run_blocking};

#[derive(Subcommand)]
pub enum CalibrateCommands {
    /// Ask the configured model the same question several times and measure agreement
    Consistency {
        /// Question to sample
        #[arg(long)]
        query: String,
        /// Number of samples (at least 2)
        #[arg(long, default_value_t = DEFAULT_SAMPLES)]
        samples: usize,
    },
    /// Score one claim from its source rating, verification status, and text markers
    Source(SourceArgs),
    /// Extract a self-reported confidence from text and discount it
    Verbalized {
        /// Text containing a statement like "confidence: 85%"
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the text from a file instead ('-' for stdin)
        #[arg(long)]
        file: Option<String>,
        /// Overconfidence discount in (0, 1]
        #[arg(long, default_value_t = DEFAULT_DISCOUNT)]
        discount: f64,
    },
    /// Weighted report confidence over a JSON array of claims
    Report {
        /// JSON array of {claim, admiralty?, status?, evidence_year?, weight?} ('-' for stdin)
        #[arg(long)]
        claims_file: String,
    },
}

#[derive(Args)]
pub struct SourceArgs {
    /// Claim text; structural markers are detected from it
    #[arg(long)]
    claim: String,
    /// Admiralty rating of the source (A1, A2, B2, C3, D4, E2)
    #[arg(long, default_value = DEFAULT_ADMIRALTY)]
    admiralty: String,
    /// Verification status of the claim
    #[arg(long, default_value = "partial", value_parser = ["verified", "partial", "unverifiable", "unknown"])]
    status: String,
    /// Publication year of the evidence
    #[arg(long)]
    evidence_year: Option<i32>,
    /// Reference year for recency (defaults to the current year)
    #[arg(long)]
    current_year: Option<i32>,
}

/// One entry of a `--claims-file` array.
#[derive(Debug, Deserialize)]
struct ClaimInput {
    claim: String,
    #[serde(default)]
    admiralty: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    evidence_year: Option<i32>,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn evidence(
    claim: &str,
    admiralty: Option<&str>,
    status: Option<&str>,
    evidence_year: Option<i32>,
    current_year: Option<i32>,
) -> ClaimEvidence {
    let mut evidence = ClaimEvidence::new(claim).with_detected_markers();
    if let Some(admiralty) = admiralty {
        evidence = evidence.with_admiralty(admiralty);
    }
    if let Some(status) = status {
        evidence = evidence.with_verification(VerificationStatus::parse(status));
    }
    if let Some(year) = evidence_year {
        evidence = evidence.with_evidence_year(year);
    }
    if let Some(year) = current_year {
        evidence = evidence.with_current_year(year);
    }
    evidence
}

pub async fn run(ctx: &Context, command: CalibrateCommands) -> i32 {
    match command {
        CalibrateCommands::Consistency { query, samples } => consistency(ctx, query, samples).await,
        CalibrateCommands::Source(args) => source(args),
        CalibrateCommands::Verbalized {
            text,
            file,
            discount,
        } => verbalized(text, file.as_deref(), discount),
        CalibrateCommands::Report { claims_file } => report(&claims_file),
    }
}

async fn consistency(ctx: &Context, query: String, samples: usize) -> i32 {
    let provider = ctx.provider.clone();
    let result = run_blocking(move || {
        let mut client = ChatClient::new(provider).map_err(TrustError::Answerer)?;
        sample_consistency(&mut client, &query, samples)
    })
    .await;

    match result {
        Ok(result) => print_json(&result),
        Err(e) => report_error(&e),
    }
}

fn source(args: SourceArgs) -> i32 {
    let evidence = evidence(
        &args.claim,
        Some(&args.admiralty),
        Some(&args.status),
        args.evidence_year,
        args.current_year,
    );
    let result = source_signal_confidence(&evidence);
    print_json(&json!({
        "evidence": evidence,
        "result": result,
    }))
}

fn verbalized(text: Option<String>, file: Option<&str>, discount: f64) -> i32 {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => read_text_from_file(path).unwrap_or_else(|e| exit_error(&e, None)),
        (None, None) => exit_error("Provide --text or --file", Some("Use --file - to read stdin.")),
    };

    match verbalized_confidence(&text, discount) {
        Ok(result) => print_json(&result),
        Err(e) => report_error(&e),
    }
}

fn report(claims_file: &str) -> i32 {
    let claims: Vec<ClaimInput> = read_json_from_file(claims_file).unwrap_or_else(|e| {
        exit_error(
            &e,
            Some("Expected a JSON array like [{\"claim\": \"...\", \"admiralty\": \"B2\", \"weight\": 1.0}]"),
        )
    });

    let (results, weights) = score_claims(&claims);
    match report_confidence(&results, Some(weights.as_slice())) {
        Ok(confidence) => print_json(&json!({
            "claims": results,
            "weights": weights,
            "report_confidence": confidence,
        })),
        Err(e) => report_error(&e),
    }
}

fn score_claims(claims: &[ClaimInput]) -> (Vec<SourceSignalResult>, Vec<f64>) {
    claims
        .iter()
        .map(|input| {
            let evidence = evidence(
                &input.claim,
                input.admiralty.as_deref(),
                input.status.as_deref(),
                input.evidence_year,
                None,
            );
            (source_signal_confidence(&evidence), input.weight)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_detects_markers_and_applies_overrides() {
        let evidence = evidence(
            "Adoption rose 40% (https://example.com/report)",
            Some("B2"),
            Some("verified"),
            Some(2024),
            Some(2025),
        );
        assert_eq!(evidence.admiralty, "B2");
        assert_eq!(evidence.verification, VerificationStatus::Verified);
        assert_eq!(evidence.evidence_year, Some(2024));
        assert!(evidence.markers.has_url);
        assert!(evidence.markers.has_percentage);
    }

    #[test]
    fn claim_inputs_default_to_weight_one() {
        let claims: Vec<ClaimInput> = serde_json::from_str(
            r#"[
                {"claim": "A load-bearing claim", "admiralty": "A1", "status": "verified"},
                {"claim": "Context", "weight": 0.3}
            ]"#,
        )
        .unwrap();

        let (results, weights) = score_claims(&claims);
        assert_eq!(weights, [1.0, 0.3]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].admiralty, "A1");
        assert_eq!(results[1].admiralty, DEFAULT_ADMIRALTY);
        assert!(results[0].confidence_pct > results[1].confidence_pct);
    }
}
