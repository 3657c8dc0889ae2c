//! SWE-smith corpus collector.
//!
//! Fetches bug-fix tasks for one repository from the SWE-smith dataset
//! hosted on HuggingFace, via the datasets-server rows API. The dataset
//! stores repositories as `swesmith/owner__repo.commithash`, so an
//! `owner/repo` request is matched by substring against the `owner__repo`
//! slug, the same convention the dataset itself uses.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::CorpusError;

use super::{split_tasks, validate_repo_name, Task, TaskSplits};

/// Default dataset identifier on HuggingFace.
pub const DEFAULT_DATASET: &str = "SWE-bench/SWE-smith";

/// Dataset split the rows are read from.
const DATASET_SPLIT: &str = "train";

/// Base URL for the HuggingFace datasets-server rows API.
const HUGGINGFACE_ROWS_API: &str = "https://datasets-server.huggingface.co/rows";

/// Configuration for corpus loading.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// HuggingFace dataset identifier.
    pub dataset: String,
    /// Maximum number of tasks to keep per repository.
    pub max_tasks: usize,
    /// Rows fetched per API page.
    pub page_size: usize,
    /// Maximum pages scanned before giving up on finding more matches.
    pub max_pages: usize,
    /// Retry attempts per page on transient failures.
    pub max_retries: u32,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            max_tasks: 300,
            page_size: 100,
            max_pages: 200,
            max_retries: 3,
        }
    }
}

/// Client for loading the task corpus of one repository.
pub struct CorpusClient {
    http_client: Client,
    config: CorpusConfig,
}

impl CorpusClient {
    /// Create a client with default configuration.
    pub fn new() -> Self {
        Self::with_config(CorpusConfig::default())
    }

    /// Create a client with explicit configuration.
    pub fn with_config(config: CorpusConfig) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    /// Load all tasks matching `owner/repo`, up to the configured maximum.
    ///
    /// Fails with [`CorpusError::EmptyCorpus`] when no rows match, so the
    /// caller surfaces the problem before any evaluation budget is spent.
    pub async fn load_tasks(&self, repo: &str) -> Result<Vec<Task>, CorpusError> {
        validate_repo_name(repo).map_err(|e| CorpusError::InvalidRepo(e.to_string()))?;
        let slug = repo.replace('/', "__");

        let mut tasks: Vec<Task> = Vec::new();
        let mut offset = 0usize;

        for page in 0..self.config.max_pages {
            let rows = self.fetch_page(offset).await?;
            if rows.is_empty() {
                break;
            }
            offset += rows.len();

            for row in rows {
                if let Some(task) = convert_row(row) {
                    if task.repo.contains(&slug) {
                        tasks.push(task);
                    }
                }
            }

            debug!(
                repo = %repo,
                page,
                matched = tasks.len(),
                "Scanned corpus page"
            );

            if tasks.len() >= self.config.max_tasks {
                break;
            }
        }

        let tasks = finalize_corpus(tasks, repo, &self.config.dataset, self.config.max_tasks)?;
        info!(repo = %repo, count = tasks.len(), "Loaded task corpus");
        Ok(tasks)
    }

    /// Load and partition the corpus for `owner/repo`.
    pub async fn load_splits(&self, repo: &str) -> Result<TaskSplits, CorpusError> {
        let tasks = self.load_tasks(repo).await?;
        Ok(split_tasks(tasks))
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<RowEnvelope>, CorpusError> {
        let url = format!(
            "{}?dataset={}&config=default&split={}&offset={}&length={}",
            HUGGINGFACE_ROWS_API,
            self.config.dataset,
            DATASET_SPLIT,
            offset,
            self.config.page_size
        );

        let mut last_error = CorpusError::HttpError("no attempts made".to_string());
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            match self.fetch_page_once(&url).await {
                Ok(rows) => return Ok(rows),
                Err(CorpusError::RateLimited { retry_after }) => {
                    let delay = retry_after.unwrap_or(2);
                    warn!(delay_secs = delay, "Corpus API rate limited, backing off");
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    last_error = CorpusError::RateLimited { retry_after };
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Corpus page fetch failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn fetch_page_once(&self, url: &str) -> Result<Vec<RowEnvelope>, CorpusError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CorpusError::HttpError(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(CorpusError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CorpusError::HttpError(format!(
                "API returned status {status}: {body}"
            )));
        }

        let parsed: RowsResponse = response
            .json()
            .await
            .map_err(|e| CorpusError::ParseError(e.to_string()))?;
        Ok(parsed.rows)
    }
}

impl Default for CorpusClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Response envelope from the datasets-server rows API.
#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RowEnvelope {
    #[allow(dead_code)]
    row_idx: Option<usize>,
    row: RowData,
}

/// Raw fields of one dataset row. Test lists are kept as raw JSON because
/// some dataset exports store them as arrays and others as JSON-encoded
/// strings.
#[derive(Debug, Deserialize)]
struct RowData {
    instance_id: Option<String>,
    repo: Option<String>,
    problem_statement: Option<String>,
    base_commit: Option<String>,
    patch: Option<String>,
    image_name: Option<String>,
    created_at: Option<String>,
    #[serde(rename = "FAIL_TO_PASS")]
    fail_to_pass: Option<Value>,
    #[serde(rename = "PASS_TO_PASS")]
    pass_to_pass: Option<Value>,
}

/// Cap the matched tasks and reject an empty corpus.
///
/// Optimizing against zero tasks is meaningless, so emptiness is an error
/// the caller must surface before any evaluation budget is spent, never a
/// silently perfect score.
pub fn finalize_corpus(
    mut tasks: Vec<Task>,
    repo: &str,
    dataset: &str,
    max_tasks: usize,
) -> Result<Vec<Task>, CorpusError> {
    tasks.truncate(max_tasks);
    if tasks.is_empty() {
        return Err(CorpusError::EmptyCorpus {
            repo: repo.to_string(),
            dataset: dataset.to_string(),
        });
    }
    Ok(tasks)
}

/// Normalize a test list field that may be an array of strings or a
/// JSON-encoded string.
fn test_list(value: Option<&Value>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Value::String(s) => serde_json::from_str::<Vec<String>>(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn convert_row(envelope: RowEnvelope) -> Option<Task> {
    let data = envelope.row;
    let instance_id = data.instance_id?;
    let repo = data.repo?;
    let problem_statement = data.problem_statement.unwrap_or_default();
    if problem_statement.is_empty() {
        return None;
    }

    let fail_to_pass = test_list(data.fail_to_pass.as_ref());
    if fail_to_pass.is_empty() {
        return None;
    }

    Some(Task {
        instance_id,
        repo,
        problem_statement,
        fail_to_pass,
        pass_to_pass: test_list(data.pass_to_pass.as_ref()),
        image_name: data.image_name.filter(|s| !s.is_empty()),
        base_commit: data.base_commit.unwrap_or_default(),
        patch: data.patch.unwrap_or_default(),
        created_at: data
            .created_at
            .and_then(|s| s.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: Value) -> RowEnvelope {
        serde_json::from_value(serde_json::json!({ "row_idx": 0, "row": json })).unwrap()
    }

    #[test]
    fn test_list_accepts_arrays() {
        let v = serde_json::json!(["tests/a.py::t1", "tests/a.py::t2"]);
        assert_eq!(test_list(Some(&v)), vec!["tests/a.py::t1", "tests/a.py::t2"]);
    }

    #[test]
    fn test_list_accepts_json_encoded_strings() {
        let v = Value::String("[\"tests/a.py::t1\"]".to_string());
        assert_eq!(test_list(Some(&v)), vec!["tests/a.py::t1"]);
    }

    #[test]
    fn test_list_tolerates_garbage() {
        assert!(test_list(Some(&Value::String("not json".to_string()))).is_empty());
        assert!(test_list(Some(&Value::Null)).is_empty());
        assert!(test_list(None).is_empty());
    }

    #[test]
    fn convert_row_builds_task() {
        let task = convert_row(envelope(serde_json::json!({
            "instance_id": "pallets__jinja.ada0a9a6.func_basic__x",
            "repo": "swesmith/pallets__jinja.ada0a9a6",
            "problem_statement": "Nested blocks render in the wrong order",
            "base_commit": "ada0a9a6",
            "patch": "diff --git a/jinja2/nodes.py b/jinja2/nodes.py\n",
            "image_name": "jyangballin/swesmith.x86_64.pallets_1776_jinja",
            "FAIL_TO_PASS": ["tests/test_core.py::test_block_order"],
            "PASS_TO_PASS": ["tests/test_core.py::test_simple"]
        })))
        .expect("row should convert");

        assert_eq!(task.instance_id, "pallets__jinja.ada0a9a6.func_basic__x");
        assert_eq!(task.fail_to_pass.len(), 1);
        assert_eq!(task.pass_to_pass.len(), 1);
        assert_eq!(
            task.image_name.as_deref(),
            Some("jyangballin/swesmith.x86_64.pallets_1776_jinja")
        );
    }

    #[test]
    fn convert_row_rejects_missing_problem_statement() {
        assert!(convert_row(envelope(serde_json::json!({
            "instance_id": "x",
            "repo": "swesmith/a__b.c",
            "FAIL_TO_PASS": ["tests/a.py::t"]
        })))
        .is_none());
    }

    #[test]
    fn convert_row_rejects_missing_target_tests() {
        assert!(convert_row(envelope(serde_json::json!({
            "instance_id": "x",
            "repo": "swesmith/a__b.c",
            "problem_statement": "broken",
            "FAIL_TO_PASS": []
        })))
        .is_none());
    }

    #[test]
    fn finalize_corpus_rejects_empty_matches() {
        let err = finalize_corpus(Vec::new(), "pallets/jinja", DEFAULT_DATASET, 300)
            .expect_err("empty corpus must be an error");
        assert!(matches!(err, crate::error::CorpusError::EmptyCorpus { .. }));
        assert!(err.to_string().contains("pallets/jinja"));
    }

    #[test]
    fn finalize_corpus_caps_task_count() {
        let tasks: Vec<Task> = (0..10)
            .map(|i| {
                convert_row(envelope(serde_json::json!({
                    "instance_id": format!("a__b.c.{i}"),
                    "repo": "swesmith/a__b.c",
                    "problem_statement": "broken",
                    "FAIL_TO_PASS": ["tests/a.py::t"]
                })))
                .unwrap()
            })
            .collect();
        let kept = finalize_corpus(tasks, "a/b", DEFAULT_DATASET, 4).unwrap();
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn default_config() {
        let config = CorpusConfig::default();
        assert_eq!(config.dataset, DEFAULT_DATASET);
        assert_eq!(config.max_tasks, 300);
        assert_eq!(config.max_retries, 3);
    }
}
