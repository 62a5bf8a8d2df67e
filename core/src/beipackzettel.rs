//! The Beipackzettel: the package insert that ships with every agent output.
//!
//! Like the leaflet inside a medicine box, it states how confident the agent
//! is, what it grounded the answer on, what it is unsure about, and what
//! could go wrong if someone acts on it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, TrustError};

/// Qualitative risk derived from confidence and the number of flagged risks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mandatory metadata attached to one agent output.
///
/// Immutable once built: the builder methods consume `self`, and there are no
/// setters. `confidence` is validated at construction and is always within
/// `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawBeipackzettel")]
pub struct Beipackzettel {
    confidence: f64,
    sources: Vec<String>,
    uncertainties: Vec<String>,
    risks: Vec<String>,
    not_checked: Vec<String>,
    model: String,
    agent_id: String,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl Beipackzettel {
    /// Create a record with the given confidence percentage.
    ///
    /// Fails with `InvalidArgument` if `confidence` is outside `[0, 100]` or NaN.
    pub fn new(confidence: f64) -> Result<Self> {
        if !(0.0..=100.0).contains(&confidence) {
            return Err(TrustError::invalid(format!(
                "confidence must be within 0-100, got {confidence}"
            )));
        }
        Ok(Self {
            confidence,
            sources: Vec::new(),
            uncertainties: Vec::new(),
            risks: Vec::new(),
            not_checked: Vec::new(),
            model: String::new(),
            agent_id: String::new(),
            metadata: BTreeMap::new(),
        })
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_uncertainties<I, S>(mut self, uncertainties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uncertainties = uncertainties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_risks<I, S>(mut self, risks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.risks = risks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_not_checked<I, S>(mut self, not_checked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_checked = not_checked.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Attach an opaque extension field. Never interpreted by the core.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn uncertainties(&self) -> &[String] {
        &self.uncertainties
    }

    pub fn risks(&self) -> &[String] {
        &self.risks
    }

    pub fn not_checked(&self) -> &[String] {
        &self.not_checked
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Whether the output cites at least one source. Ungrounded output is a red flag.
    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn risk_level(&self) -> RiskLevel {
        if self.confidence < 50.0 || self.risks.len() >= 3 {
            RiskLevel::High
        } else if self.confidence >= 80.0 && self.risks.is_empty() {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }

    /// Whether there are known unknowns: uncertainties or unchecked assumptions.
    pub fn has_gaps(&self) -> bool {
        !self.uncertainties.is_empty() || !self.not_checked.is_empty()
    }
}

impl fmt::Display for Beipackzettel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Beipackzettel")?;
        writeln!(f, "   Confidence: {:.0}%", self.confidence)?;
        if self.sources.is_empty() {
            writeln!(f, "   Sources: none (ungrounded)")?;
        } else {
            writeln!(f, "   Sources: {}", self.sources.join(", "))?;
        }
        if !self.uncertainties.is_empty() {
            writeln!(f, "   Uncertain: {}", self.uncertainties.join("; "))?;
        }
        if !self.risks.is_empty() {
            writeln!(f, "   Risks: {}", self.risks.join("; "))?;
        }
        if !self.not_checked.is_empty() {
            writeln!(f, "   Not checked: {}", self.not_checked.join("; "))?;
        }
        write!(f, "   Risk level: {}", self.risk_level())
    }
}

/// Serialized form: stored fields plus the derived `risk_level` and `is_grounded`.
#[derive(Serialize)]
struct Label<'a> {
    confidence: f64,
    sources: &'a [String],
    uncertainties: &'a [String],
    risks: &'a [String],
    not_checked: &'a [String],
    model: &'a str,
    agent_id: &'a str,
    risk_level: RiskLevel,
    is_grounded: bool,
    #[serde(skip_serializing_if = "no_metadata")]
    metadata: &'a BTreeMap<String, serde_json::Value>,
}

fn no_metadata(metadata: &&BTreeMap<String, serde_json::Value>) -> bool {
    metadata.is_empty()
}

impl Serialize for Beipackzettel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Label {
            confidence: self.confidence,
            sources: &self.sources,
            uncertainties: &self.uncertainties,
            risks: &self.risks,
            not_checked: &self.not_checked,
            model: &self.model,
            agent_id: &self.agent_id,
            risk_level: self.risk_level(),
            is_grounded: self.is_grounded(),
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

/// Wire form accepted on input. Derived fields are ignored and recomputed.
#[derive(Deserialize)]
struct RawBeipackzettel {
    confidence: f64,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    uncertainties: Vec<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    not_checked: Vec<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawBeipackzettel> for Beipackzettel {
    type Error = TrustError;

    fn try_from(raw: RawBeipackzettel) -> Result<Self> {
        let mut bpz = Beipackzettel::new(raw.confidence)?
            .with_sources(raw.sources)
            .with_uncertainties(raw.uncertainties)
            .with_risks(raw.risks)
            .with_not_checked(raw.not_checked)
            .with_model(raw.model)
            .with_agent_id(raw.agent_id);
        bpz.metadata = raw.metadata;
        Ok(bpz)
    }
}
