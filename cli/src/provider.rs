//! OpenAI-compatible chat-completions binding for the core collaborators.
//!
//! Everything here is blocking. Build and use these types on tokio's blocking
//! pool, never directly inside an async task.

use std::sync::LazyLock;
use std::time::Duration;

use agenttrust_core::calibration::{Answerer, sample_consistency, verbalized_confidence};
use agenttrust_core::{Agent, AgentOutput, Beipackzettel, BoxError, Dimension, DimensionScorer, TrustError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>()\[\]"']+"#).expect("valid url regex"));

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*(uncertaint(?:y|ies)|risks?|not checked)\s*:\s*(.+)$")
        .expect("valid section regex")
});

static LABELED_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)score\s*[:=]?\s*([0-2])\b").expect("valid labeled score regex"));

static BARE_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-2])\b").expect("valid bare score regex"));

const AGENT_SYSTEM_PROMPT: &str = "Answer the user's question. After the answer, add these lines:\n\
Confidence: <0-100>%\n\
Uncertainties: <semicolon-separated list, or none>\n\
Risks: <semicolon-separated list, or none>\n\
Not checked: <semicolon-separated list, or none>\n\
Cite sources as full URLs.";

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict reviewer. Score the output on the given \
dimension with 0, 1 or 2 according to the guide. Reply with 'Score: <n>' and one sentence of \
justification.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Where and how to reach the model.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Blocking chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::blocking::Client,
    config: ProviderConfig,
}

impl ChatClient {
    pub fn new(config: ProviderConfig) -> Result<Self, BoxError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String, BoxError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&ChatRequest {
            model: &self.config.model,
            messages,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(format!("provider returned {status}: {body}").into());
        }

        let parsed: ChatResponse = response.json()?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BoxError::from("provider returned no message content"))?;
        tracing::debug!(model = %self.config.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

impl Answerer for ChatClient {
    fn answer(&mut self, query: &str) -> Result<String, BoxError> {
        self.complete(None, query)
    }
}

/// Model-backed agent that attaches a Beipackzettel to every answer.
///
/// Confidence comes from the model's own "Confidence: NN%" line, discounted.
/// When the model states none, the question is re-asked and sample
/// consistency decides.
#[derive(Debug)]
pub struct LlmAgent {
    client: ChatClient,
    agent_id: String,
    samples: usize,
    discount: f64,
}

impl LlmAgent {
    pub fn new(client: ChatClient, agent_id: impl Into<String>) -> Self {
        Self {
            client,
            agent_id: agent_id.into(),
            samples: agenttrust_core::calibration::DEFAULT_SAMPLES,
            discount: agenttrust_core::calibration::DEFAULT_DISCOUNT,
        }
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    fn calibrate(&mut self, query: &str, output: &str) -> Result<(f64, &'static str), BoxError> {
        match verbalized_confidence(output, self.discount) {
            Ok(verbalized) => Ok((verbalized.calibrated_confidence, "verbalized")),
            Err(TrustError::NotFound(_)) => {
                let sampled = sample_consistency(&mut self.client, query, self.samples)?;
                Ok((sampled.confidence_pct, "sample_consistency"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Agent for LlmAgent {
    fn execute(&mut self, query: &str) -> Result<AgentOutput, BoxError> {
        let output = self.client.complete(Some(AGENT_SYSTEM_PROMPT), query)?;
        let (confidence, method) = self.calibrate(query, &output)?;
        let sections = Sections::parse(&output);

        let beipackzettel = Beipackzettel::new(confidence)?
            .with_sources(extract_urls(&output))
            .with_uncertainties(sections.uncertainties)
            .with_risks(sections.risks)
            .with_not_checked(sections.not_checked)
            .with_model(self.client.model())
            .with_agent_id(self.agent_id.as_str())
            .with_metadata("calibration_method", json!(method));
        Ok(AgentOutput::new(output, beipackzettel))
    }
}

/// Model-backed rubric judge: one completion per dimension.
#[derive(Debug)]
pub struct LlmJudge {
    client: ChatClient,
}

impl LlmJudge {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

impl DimensionScorer for LlmJudge {
    fn score(&self, output: &str, dimension: &Dimension) -> Result<i64, BoxError> {
        let prompt = judge_prompt(output, dimension);
        let reply = self.client.complete(Some(JUDGE_SYSTEM_PROMPT), &prompt)?;
        parse_judge_score(&reply)
            .ok_or_else(|| format!("judge reply has no 0-2 score: {reply}").into())
    }
}

fn judge_prompt(output: &str, dimension: &Dimension) -> String {
    format!(
        "Dimension: {name}\n{description}\n\n\
         0 = {s0}\n1 = {s1}\n2 = {s2}\n\n\
         Output to review:\n---\n{output}\n---",
        name = dimension.name,
        description = dimension.description,
        s0 = dimension.score_0,
        s1 = dimension.score_1,
        s2 = dimension.score_2,
    )
}

/// First "Score: n" in the reply, else the first standalone 0, 1 or 2.
pub fn parse_judge_score(reply: &str) -> Option<i64> {
    LABELED_SCORE_RE
        .captures(reply)
        .or_else(|| BARE_SCORE_RE.captures(reply))
        .and_then(|caps| caps[1].parse().ok())
}

/// Distinct URLs in order of appearance, trailing punctuation stripped.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in URL_RE.find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':']);
        if !urls.iter().any(|seen| seen == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Labeled trailer lines of an agent answer.
#[derive(Debug, Default, PartialEq)]
struct Sections {
    uncertainties: Vec<String>,
    risks: Vec<String>,
    not_checked: Vec<String>,
}

impl Sections {
    fn parse(text: &str) -> Self {
        let mut sections = Self::default();
        for caps in SECTION_RE.captures_iter(text) {
            let items = caps[2]
                .split(';')
                .map(str::trim)
                .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("none"))
                .map(str::to_string);
            let label = caps[1].to_ascii_lowercase();
            let target = if label.starts_with("uncertaint") {
                &mut sections.uncertainties
            } else if label.starts_with("risk") {
                &mut sections.risks
            } else {
                &mut sections.not_checked
            };
            target.extend(items);
        }
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn judge_score_prefers_labeled_value() {
        assert_eq!(parse_judge_score("Score: 2. Clear and sourced."), Some(2));
        assert_eq!(parse_judge_score("Out of 2 points, score = 1"), Some(1));
        assert_eq!(parse_judge_score("I'd give it a 0 here."), Some(0));
        assert_eq!(parse_judge_score("Excellent work."), None);
        assert_eq!(parse_judge_score("Score: 7"), None);
    }

    #[test]
    fn urls_are_deduplicated_and_trimmed() {
        let text = "See https://arxiv.org/abs/2506.04133. Also (https://example.com/a), \
                    and again https://arxiv.org/abs/2506.04133";
        assert_eq!(
            extract_urls(text),
            ["https://arxiv.org/abs/2506.04133", "https://example.com/a"]
        );
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn trailer_sections_are_split_and_none_is_dropped() {
        let text = "Paris is the capital.\n\
                    Confidence: 90%\n\
                    Uncertainties: population figure; boundary changes\n\
                    Risks: none\n\
                    - Not checked: official census data";
        let sections = Sections::parse(text);
        assert_eq!(sections.uncertainties, ["population figure", "boundary changes"]);
        assert!(sections.risks.is_empty());
        assert_eq!(sections.not_checked, ["official census data"]);
    }

    #[test]
    fn judge_prompt_carries_the_scoring_guide() {
        let dimension = agenttrust_core::rubric::dimension("sources").unwrap();
        let prompt = judge_prompt("text", dimension);
        assert!(prompt.contains("Source Quality"));
        assert!(prompt.contains("0 = No sources or irrelevant sources"));
        assert!(prompt.ends_with("---\ntext\n---"));
    }
}
