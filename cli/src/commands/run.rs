use agenttrust_core::calibration::{DEFAULT_DISCOUNT, DEFAULT_SAMPLES};
use agenttrust_core::{AgentPipeline, PipelineConfig, SamplingPolicy, SharedTrustScore, Tier, TrustError};
use clap::Args;
use serde_json::json;

use crate::Context;
use crate::provider::{ChatClient, LlmAgent, LlmJudge};
use crate::util::{exit_error, print_json, report_error, run_blocking};

#[derive(Args)]
pub struct RunArgs {
    /// Agent id whose trust ledger gates review
    #[arg(long)]
    agent: String,
    /// Query to send to the agent
    #[arg(long)]
    query: String,
    /// Review tier: 1 quick lookup, 2 standard brief, 3 deep dive
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    tier: Option<u8>,
    /// Maximum execute/review cycles before rejecting
    #[arg(long)]
    max_iterations: Option<u32>,
    /// Review every run while the QA rate is above zero instead of sampling
    #[arg(long)]
    always_review: bool,
    /// Seed for spot-check sampling
    #[arg(long)]
    seed: Option<u64>,
    /// Score with the configured model instead of text heuristics
    #[arg(long)]
    judge: bool,
    /// Samples for the consistency fallback when the model states no confidence
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    samples: usize,
    /// Discount applied to the model's stated confidence
    #[arg(long, default_value_t = DEFAULT_DISCOUNT)]
    discount: f64,
}

impl RunArgs {
    /// Command-line flags layered over the config file.
    fn pipeline_config(&self, base: PipelineConfig) -> Result<PipelineConfig, TrustError> {
        let mut config = base;
        if let Some(tier) = self.tier {
            config.tier = Tier::try_from(tier)?;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if self.always_review {
            config.sampling = SamplingPolicy::Always;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run(ctx: &Context, args: RunArgs) -> i32 {
    let config = match args.pipeline_config(ctx.config.pipeline) {
        Ok(config) => config,
        Err(e) => return report_error(&e),
    };
    let trust = ctx
        .ledgers
        .load(&args.agent, ctx.config.trust)
        .unwrap_or_else(|e| exit_error(&e, None));
    let shared = SharedTrustScore::new(trust);

    let provider = ctx.provider.clone();
    let handle = shared.clone();
    let RunArgs {
        agent,
        query,
        judge,
        samples,
        discount,
        ..
    } = args;
    tracing::info!(agent_id = %agent, tier = config.tier.number(), "pipeline run started");

    let result = run_blocking(move || {
        let build = |provider| {
            ChatClient::new(provider)
                .unwrap_or_else(|e| exit_error(&format!("Failed to build HTTP client: {e}"), None))
        };
        let llm_agent = LlmAgent::new(build(provider.clone()), agent)
            .with_samples(samples)
            .with_discount(discount);
        let mut pipeline = AgentPipeline::new(llm_agent, handle, config)?;
        if judge {
            pipeline = pipeline.with_scorer(LlmJudge::new(build(provider)));
        }
        pipeline.run(&query)
    })
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => return report_error(&e),
    };
    let ledger = if result.trust_event.is_some() {
        Some(
            ctx.ledgers
                .save(&shared.to_ledger())
                .unwrap_or_else(|e| exit_error(&e, None)),
        )
    } else {
        None
    };

    print_json(&json!({
        "result": result,
        "trust": shared.summary(),
        "ledger": ledger,
    }))
}
