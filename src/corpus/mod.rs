//! Task corpus: loading, validation, and deterministic splitting.
//!
//! Tasks come from the SWE-smith dataset on HuggingFace. Each task is one
//! verifiable bug: a repository revision, a problem statement, a set of
//! tests that must transition from failing to passing, and a pointer to a
//! reproducible Docker environment. The corpus is immutable once loaded and
//! partitioned exactly once into train/validation/test subsets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod collector;
pub mod split;

pub use collector::{finalize_corpus, CorpusClient, CorpusConfig, DEFAULT_DATASET};
pub use split::{split_tasks, TaskSplits, TRAIN_FRACTION, VAL_FRACTION};

/// Validate a git ref (commit SHA, branch name) to prevent shell injection.
///
/// Accepts hex-only SHAs (short or full) and standard git ref names
/// (alphanumeric, `/`, `.`, `-`, `_`). Rejects shell metacharacters,
/// `..` sequences (path traversal), and refs starting with `-` (flag injection).
pub fn validate_git_ref(s: &str) -> Result<(), anyhow::Error> {
    if s.is_empty() {
        anyhow::bail!("git ref is empty");
    }
    if s.len() > 256 {
        anyhow::bail!("git ref too long ({} chars, max 256)", s.len());
    }
    if s.starts_with('-') {
        anyhow::bail!(
            "git ref '{}' must not start with '-' (could be interpreted as a flag)",
            s
        );
    }
    if s.contains("..") {
        anyhow::bail!("git ref '{}' must not contain '..' (path traversal)", s);
    }
    for ch in s.chars() {
        if !matches!(ch, 'a'..='z' | 'A'..='Z' | '0'..='9' | '/' | '.' | '-' | '_' | '~' | '^') {
            anyhow::bail!(
                "invalid character '{}' in git ref '{}': only alphanumeric, /, ., -, _, ~, ^ allowed",
                ch,
                s
            );
        }
    }
    Ok(())
}

/// Validate a repository identifier in `owner/repo` form.
///
/// Both parts may contain only alphanumeric characters, hyphens,
/// underscores, and dots, and must not start with `.` or `-`.
pub fn validate_repo_name(s: &str) -> Result<(), anyhow::Error> {
    if s.is_empty() {
        anyhow::bail!("repository name is empty");
    }
    if s.len() > 256 {
        anyhow::bail!("repository name too long ({} chars, max 256)", s.len());
    }
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 2 {
        anyhow::bail!(
            "invalid repository name '{}': expected 'owner/repo' format",
            s
        );
    }
    for part in &parts {
        if part.is_empty() {
            anyhow::bail!(
                "invalid repository name '{}': owner and repo must be non-empty",
                s
            );
        }
        if part.starts_with('.') || part.starts_with('-') {
            anyhow::bail!(
                "invalid repository name '{}': parts must not start with '.' or '-'",
                s
            );
        }
        for ch in part.chars() {
            if !matches!(ch, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.') {
                anyhow::bail!(
                    "invalid character '{}' in repository name '{}': only alphanumeric, -, _, . allowed",
                    ch,
                    s
                );
            }
        }
    }
    Ok(())
}

/// Validate a test identifier (pytest node id) before it is interpolated
/// into a container command.
///
/// Accepts `path/to/test.py::TestClass::test_name[param-0]` shapes. Rejects
/// shell metacharacters, quotes, whitespace, and `..` traversal.
pub fn validate_test_id(s: &str) -> Result<(), anyhow::Error> {
    if s.is_empty() {
        anyhow::bail!("test id is empty");
    }
    if s.len() > 512 {
        anyhow::bail!("test id too long ({} chars, max 512)", s.len());
    }
    if s.contains("..") && !s.contains("[") {
        // `..` outside a parametrization bracket is path traversal
        anyhow::bail!("test id '{}' contains '..' (path traversal)", s);
    }
    for ch in s.chars() {
        if !matches!(ch,
            'a'..='z' | 'A'..='Z' | '0'..='9'
            | '/' | '.' | '-' | '_' | ':' | '[' | ']' | '=' | ',' | '+')
        {
            anyhow::bail!(
                "invalid character '{}' in test id '{}': shell metacharacters not allowed",
                ch,
                s
            );
        }
    }
    Ok(())
}

/// A single verifiable bug-fix task.
///
/// Immutable once loaded. The reference `patch` is the dataset's gold
/// solution and is never shown to the agent; it exists for debugging only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable dataset identifier, e.g. `pallets__jinja.ada0a9a6.func_basic__xyz`.
    pub instance_id: String,
    /// Dataset-form repository slug, e.g. `swesmith/pallets__jinja.ada0a9a6`.
    pub repo: String,
    /// Bug description shown to the agent as the objective.
    pub problem_statement: String,
    /// Tests that must transition from failing to passing.
    pub fail_to_pass: Vec<String>,
    /// Tests that must remain passing.
    pub pass_to_pass: Vec<String>,
    /// Docker image for the reference environment, when the dataset names one.
    pub image_name: Option<String>,
    /// Base commit for the buggy revision.
    pub base_commit: String,
    /// Reference solution patch (not shown to the agent).
    #[serde(default)]
    pub patch: String,
    /// Dataset row creation timestamp, when present.
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Resolve the Docker image for this task's reference environment.
    ///
    /// Prefers the dataset-provided `image_name`; otherwise derives the
    /// standard SWE-bench evaluation image name from the instance id.
    pub fn docker_image(&self) -> String {
        if let Some(name) = &self.image_name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        let iid = self.instance_id.replace("__", "_1776_").to_lowercase();
        format!("docker.io/swebench/sweb.eval.x86_64.{iid}:latest")
    }

    /// Returns true if the task has at least one fail-to-pass test.
    pub fn has_target_tests(&self) -> bool {
        !self.fail_to_pass.is_empty()
    }
}
