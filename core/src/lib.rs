//! Trust infrastructure for AI agent outputs.
//!
//! - [`calibration`]: confidence estimates from consistency, sources, or
//!   self-reports
//! - [`beipackzettel`]: the package insert attached to every output
//! - [`rubric`] and [`review`]: eight-dimension quality review with verdicts
//! - [`trust`]: per-agent trust score driven by calibration outcomes
//! - [`pipeline`]: execute, review, deliver, with trust-gated QA
//!
//! The crate performs no I/O. Agents, answerers and scorers are injected.

pub mod beipackzettel;
pub mod calibration;
pub mod error;
pub mod pipeline;
pub mod review;
pub mod rubric;
pub mod shared;
pub mod trust;

pub use beipackzettel::{Beipackzettel, RiskLevel};
pub use error::{BoxError, ErrorReport, Result, TrustError};
pub use pipeline::{Agent, AgentOutput, AgentPipeline, PipelineConfig, PipelineResult, SamplingPolicy};
pub use review::{DimensionScorer, HeuristicScorer, ReviewResult, Reviewer, Verdict};
pub use rubric::{Dimension, RubricScore, Tier};
pub use shared::{SharedTrustScore, TrustRegistry};
pub use trust::{Outcome, TrustBounds, TrustEvent, TrustLedger, TrustLevel, TrustScore, TrustSummary};
