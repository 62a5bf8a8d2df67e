use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use agenttrust_core::{PipelineConfig, TrustBounds, TrustError, TrustLedger, TrustScore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

static AGENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid agent id regex"));

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap_or_else(|_| err.to_string()));
    std::process::exit(1);
}

/// Print a core error as its structured report and return the exit code.
pub fn report_error(err: &TrustError) -> i32 {
    let report = err.report();
    match serde_json::to_string_pretty(&report) {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{}", err),
    }
    1
}

/// Pretty-print a value on stdout. Returns the exit code.
pub fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            println!("{body}");
            0
        }
        Err(e) => exit_error(&format!("Failed to serialize output: {e}"), None),
    }
}

/// Run blocking provider work on tokio's blocking pool.
pub async fn run_blocking<T, F>(work: F) -> Result<T, TrustError>
where
    F: FnOnce() -> Result<T, TrustError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) => exit_error(&format!("Worker thread failed: {e}"), None),
    }
}

/// Read text from a file path or stdin (when path is "-").
pub fn read_text_from_file(path: &str) -> Result<String, String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {e}"))?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, String> {
    let raw = read_text_from_file(path)?;
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

/// Settings loaded from `--config`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub pipeline: PipelineConfig,
    /// Bounds for agents without a ledger yet.
    pub trust: TrustBounds,
}

impl CliConfig {
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let config: Self = read_json_from_file(path)?;
        config.pipeline.validate().map_err(|e| e.to_string())?;
        config.trust.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

pub fn default_ledger_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agenttrust")
        .join("ledgers")
}

/// One JSON trust ledger per agent id, in a single directory.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
}

impl LedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store at `dir`, or the platform config dir when absent.
    pub fn open(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::new(default_ledger_dir()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, agent_id: &str) -> Result<PathBuf, String> {
        if !AGENT_ID_RE.is_match(agent_id) {
            return Err(format!(
                "Invalid agent id '{agent_id}': use letters, digits, '.', '_' or '-'"
            ));
        }
        Ok(self.dir.join(format!("{agent_id}.json")))
    }

    /// Load an agent's score by replaying its ledger, or start fresh with `bounds`.
    pub fn load(&self, agent_id: &str, bounds: TrustBounds) -> Result<TrustScore, String> {
        let path = self.path_for(agent_id)?;
        if !path.exists() {
            return TrustScore::with_bounds(agent_id, bounds).map_err(|e| e.to_string());
        }
        let data = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read ledger '{}': {e}", path.display()))?;
        let ledger: TrustLedger = serde_json::from_str(&data)
            .map_err(|e| format!("Corrupt ledger '{}': {e}", path.display()))?;
        if ledger.agent_id != agent_id {
            return Err(format!(
                "Ledger '{}' belongs to agent '{}'",
                path.display(),
                ledger.agent_id
            ));
        }
        TrustScore::from_ledger(ledger).map_err(|e| e.to_string())
    }

    pub fn save(&self, ledger: &TrustLedger) -> Result<PathBuf, String> {
        let path = self.path_for(&ledger.agent_id)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create '{}': {e}", self.dir.display()))?;
        let data = serde_json::to_string_pretty(ledger)
            .map_err(|e| format!("Failed to serialize ledger: {e}"))?;
        // Write-then-rename so a crash never leaves a truncated ledger.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)
            .map_err(|e| format!("Failed to write '{}': {e}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| format!("Failed to replace '{}': {e}", path.display()))?;
        Ok(path)
    }

    pub fn remove(&self, agent_id: &str) -> Result<bool, String> {
        let path = self.path_for(agent_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(format!("Failed to remove '{}': {e}", path.display())),
        }
    }

    /// Every stored score, sorted by agent id. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<TrustScore>, String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to read '{}': {e}", self.dir.display())),
        };

        let mut scores = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| e.to_string())?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(agent_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            scores.push(self.load(agent_id, TrustBounds::default())?);
        }
        scores.sort_by(|a, b| a.agent_id().cmp(b.agent_id()));
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use agenttrust_core::Outcome;

    use super::*;

    #[test]
    fn missing_ledger_starts_fresh_with_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());
        let bounds = TrustBounds {
            initial: 40,
            ..Default::default()
        };
        let trust = store.load("writer", bounds).unwrap();
        assert_eq!(trust.score(), 40);
        assert!(trust.history().is_empty());
    }

    #[test]
    fn saved_ledger_replays_to_same_score() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("nested"));
        let mut trust = store.load("writer", TrustBounds::default()).unwrap();
        trust.update(90.0, Outcome::Good, None, None);
        trust.update(60.0, Outcome::FlaggedReal, None, None);

        let path = store.save(&trust.to_ledger()).unwrap();
        assert!(path.ends_with("writer.json"));

        let restored = store.load("writer", TrustBounds::default()).unwrap();
        assert_eq!(restored, trust);
        assert_eq!(restored.score(), 3);
    }

    #[test]
    fn list_skips_foreign_files_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());
        for id in ["zeta", "alpha"] {
            let trust = TrustScore::new(id);
            store.save(&trust.to_ledger()).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let ids: Vec<String> = store
            .list()
            .unwrap()
            .iter()
            .map(|t| t.agent_id().to_string())
            .collect();
        assert_eq!(ids, ["alpha", "zeta"]);
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn rejects_path_like_agent_ids() {
        let store = LedgerStore::new("/tmp");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("writer-agent_2.v1").is_ok());
    }

    #[test]
    fn remove_reports_whether_a_ledger_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());
        store.save(&TrustScore::new("a").to_ledger()).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
    }

    #[test]
    fn config_file_sections_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agenttrust.json");
        std::fs::write(&path, r#"{"pipeline": {"tier": 3, "sampling": "always"}}"#).unwrap();

        let config = CliConfig::load(path.to_str()).unwrap();
        assert_eq!(config.pipeline.tier, agenttrust_core::Tier::Deep);
        assert_eq!(config.pipeline.max_iterations, 3);
        assert_eq!(config.trust, TrustBounds::default());
    }

    #[test]
    fn config_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"pipeline": {"max_iterations": 0}}"#).unwrap();
        assert!(CliConfig::load(path.to_str()).is_err());
    }
}
