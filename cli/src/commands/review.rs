use agenttrust_core::rubric::DIMENSIONS;
use agenttrust_core::{Reviewer, Tier};
use clap::Args;
use serde_json::json;

use crate::Context;
use crate::provider::{ChatClient, LlmJudge};
use crate::util::{exit_error, print_json, read_text_from_file, report_error, run_blocking};

#[derive(Args)]
pub struct ReviewArgs {
    /// File holding the output to review ('-' for stdin)
    #[arg(long)]
    file: String,
    /// Review tier: 1 quick lookup, 2 standard brief, 3 deep dive
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    tier: Option<u8>,
    /// Score with the configured model instead of text heuristics
    #[arg(long)]
    judge: bool,
}

pub async fn run(ctx: &Context, args: ReviewArgs) -> i32 {
    let output = read_text_from_file(&args.file).unwrap_or_else(|e| exit_error(&e, None));
    let tier = match args.tier.map(Tier::try_from).transpose() {
        Ok(tier) => tier.unwrap_or(ctx.config.pipeline.tier),
        Err(e) => return report_error(&e),
    };

    let provider = ctx.provider.clone();
    let judge = args.judge;
    let result = run_blocking(move || {
        let reviewer = if judge {
            let client = ChatClient::new(provider)
                .unwrap_or_else(|e| exit_error(&format!("Failed to build HTTP client: {e}"), None));
            Reviewer::new(tier).with_scorer(LlmJudge::new(client))
        } else {
            Reviewer::new(tier)
        };
        reviewer.review(&output)
    })
    .await;

    match result {
        Ok(review) => print_json(&json!({
            "review": review,
            "passes": review.rubric_score().passes(tier),
            "weakest": review.rubric_score().weakest(),
        })),
        Err(e) => report_error(&e),
    }
}

/// Print every rubric dimension with its scoring guide.
pub fn rubric() -> i32 {
    print_json(&json!({
        "dimensions": DIMENSIONS,
        "tiers": ([Tier::Quick, Tier::Standard, Tier::Deep]
            .iter()
            .map(|tier| json!({
                "tier": tier,
                "pass_threshold": tier.pass_threshold(),
                "revise_floor": tier.revise_floor(),
            }))
            .collect::<Vec<_>>()),
    }))
}
