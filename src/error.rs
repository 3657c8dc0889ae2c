//! Error types for skill-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Corpus loading and splitting
//! - LLM API interactions
//! - Agent execution
//! - Patch verification infrastructure
//! - Skill generation and artifact output
//!
//! Per-evaluation failures (agent crash, malformed patch, flaky test
//! infrastructure) are caught at the evaluator boundary and converted into
//! scored outcomes; only corpus- and configuration-level errors abort a run.

use thiserror::Error;

/// Errors that can occur while loading or splitting the task corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("No tasks found for repository '{repo}' in {dataset}")]
    EmptyCorpus { repo: String, dataset: String },

    #[error("Invalid repository identifier '{0}': expected 'owner/repo'")]
    InvalidRepo(String),

    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Failed to parse dataset response: {0}")]
    ParseError(String),

    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: set OPENROUTER_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Model '{model}' returned an empty response")]
    EmptyResponse { model: String },
}

/// Errors that can occur while running the coding agent.
///
/// All of these are scored as 0 by the evaluator; none abort the search.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Agent setup failed: {0}")]
    Setup(String),

    #[error("Agent crashed: {0}")]
    Crashed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Infrastructure failures while verifying a patch.
///
/// Distinct from a test *failing*: these indicate the environment could not
/// be provisioned or the test run never completed, and are retried a bounded
/// number of times before being scored as 0.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Failed to provision verification environment: {0}")]
    Provision(String),

    #[error("Test execution timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Verification infrastructure failure: {0}")]
    Infra(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during skill generation or artifact output.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("Invalid skill name derived from '{0}'")]
    InvalidName(String),

    #[error("Failed to fetch repository metadata: {0}")]
    Fetch(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
