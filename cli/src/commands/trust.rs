use agenttrust_core::{Outcome, TrustScore};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::Context;
use crate::util::{exit_error, print_json, report_error};

#[derive(Subcommand)]
pub enum TrustCommands {
    /// Show one agent's trust summary, or every stored agent
    Show {
        /// Agent id (omit to list all agents)
        #[arg(long)]
        agent: Option<String>,
        /// Include the full event history
        #[arg(long)]
        history: bool,
    },
    /// Record an outcome for an agent
    Update {
        /// Agent id
        #[arg(long)]
        agent: String,
        /// Confidence the agent stated for the output (0-100)
        #[arg(long)]
        confidence: f64,
        /// What actually happened
        #[arg(long, value_parser = ["good", "bad", "flagged_real", "hidden_problem"])]
        outcome: String,
        /// Free-text reason (defaults to one derived from the outcome)
        #[arg(long)]
        reason: Option<String>,
        /// Event timestamp (RFC3339). Defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Delete an agent's ledger so it starts over
    Reset {
        /// Agent id
        #[arg(long)]
        agent: String,
    },
}

pub fn run(ctx: &Context, command: TrustCommands) -> i32 {
    match command {
        TrustCommands::Show { agent, history } => show(ctx, agent.as_deref(), history),
        TrustCommands::Update {
            agent,
            confidence,
            outcome,
            reason,
            timestamp,
        } => update(
            ctx,
            &agent,
            confidence,
            &outcome,
            reason.as_deref(),
            timestamp.as_deref(),
        ),
        TrustCommands::Reset { agent } => reset(ctx, &agent),
    }
}

fn describe(trust: &TrustScore, history: bool) -> serde_json::Value {
    let mut value = json!({ "summary": trust.summary() });
    if history {
        value["history"] = json!(trust.history());
    }
    value
}

fn show(ctx: &Context, agent: Option<&str>, history: bool) -> i32 {
    match agent {
        Some(agent) => {
            let trust = ctx
                .ledgers
                .load(agent, ctx.config.trust)
                .unwrap_or_else(|e| exit_error(&e, None));
            print_json(&describe(&trust, history))
        }
        None => {
            let all = ctx.ledgers.list().unwrap_or_else(|e| exit_error(&e, None));
            let agents: Vec<_> = all.iter().map(|trust| describe(trust, history)).collect();
            print_json(&json!({
                "ledger_dir": ctx.ledgers.dir(),
                "agents": agents,
            }))
        }
    }
}

fn update(
    ctx: &Context,
    agent: &str,
    confidence: f64,
    outcome: &str,
    reason: Option<&str>,
    timestamp: Option<&str>,
) -> i32 {
    if !(0.0..=100.0).contains(&confidence) {
        exit_error(
            &format!("confidence must be between 0 and 100, got {confidence}"),
            None,
        );
    }
    let outcome: Outcome = match outcome.parse() {
        Ok(outcome) => outcome,
        Err(e) => return report_error(&e),
    };
    let timestamp = timestamp.map(|ts| {
        DateTime::parse_from_rfc3339(ts)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| exit_error(&format!("Invalid --timestamp '{ts}': {e}"), Some("Use RFC3339, e.g. 2026-03-01T12:00:00Z")))
    });

    let mut trust = ctx
        .ledgers
        .load(agent, ctx.config.trust)
        .unwrap_or_else(|e| exit_error(&e, None));
    let event = trust.update(confidence, outcome, reason, timestamp);
    let path = ctx
        .ledgers
        .save(&trust.to_ledger())
        .unwrap_or_else(|e| exit_error(&e, None));

    print_json(&json!({
        "event": event,
        "summary": trust.summary(),
        "ledger": path,
    }))
}

fn reset(ctx: &Context, agent: &str) -> i32 {
    let removed = ctx
        .ledgers
        .remove(agent)
        .unwrap_or_else(|e| exit_error(&e, None));
    print_json(&json!({
        "agent_id": agent,
        "removed": removed,
    }))
}
