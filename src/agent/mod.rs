//! Agent backend: run a coding agent against one task with skill guidance.
//!
//! The core depends on agents only through [`AgentBackend`]: run an agent
//! with given guidance and objective, bounded by a timeout, returning a
//! patch or a failure. Any execution backend satisfying that contract is
//! substitutable; the production implementation here drives a headless
//! agent CLI inside the task's Docker image.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::sandbox::{truncate, DockerSandbox};

/// Path the candidate skill is written to inside the container.
const GUIDANCE_PATH: &str = "/tmp/skill_guidance.md";
/// Path the problem statement is written to inside the container.
const PROBLEM_PATH: &str = "/tmp/problem_statement.md";

/// One agent invocation: guidance, objective, and execution bounds.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    /// Candidate skill text injected as system-level guidance.
    pub guidance: String,
    /// The task's bug description.
    pub objective: String,
    /// Model identifier for the agent's LLM.
    pub model: String,
    /// Docker image of the task's reference environment.
    pub image: String,
    /// Task identifier, used for container naming and logging.
    pub task_id: String,
    /// Wall-clock bound for the whole invocation.
    pub timeout: Duration,
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Unified diff of the agent's changes against the reference revision.
    /// Empty when the agent produced no changes.
    pub patch: String,
    /// Truncated tail of the agent's combined output.
    pub transcript: String,
    /// Time spent inside the agent process.
    pub duration: Duration,
}

/// Capability contract for running a coding agent.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Run the agent once. Timeouts map to [`AgentError::Timeout`]; a
    /// crashed agent that still left changes behind returns those changes.
    async fn solve(&self, request: &SolveRequest) -> Result<AgentRun, AgentError>;
}

/// Validate a model identifier before it is interpolated into a container
/// command (e.g. `openai/gpt-5.2`, `anthropic/claude-opus-4.5:nitro`).
pub fn validate_model_id(s: &str) -> Result<(), AgentError> {
    if s.is_empty() || s.len() > 128 {
        return Err(AgentError::Setup(format!("invalid model id '{s}'")));
    }
    for ch in s.chars() {
        if !matches!(ch, 'a'..='z' | 'A'..='Z' | '0'..='9' | '/' | '.' | '-' | '_' | ':') {
            return Err(AgentError::Setup(format!(
                "invalid character '{ch}' in model id '{s}'"
            )));
        }
    }
    Ok(())
}

/// Configuration for the Docker-hosted agent.
#[derive(Debug, Clone)]
pub struct DockerAgentConfig {
    /// Command that launches the headless agent inside the container.
    /// The guidance file, problem file, and model are appended as flags.
    pub agent_cmd: String,
    /// API key exported into the container for the agent's LLM calls.
    pub api_key: Option<String>,
    /// Maximum transcript bytes retained for diagnostics.
    pub transcript_cap: usize,
}

impl Default for DockerAgentConfig {
    fn default() -> Self {
        Self {
            agent_cmd: "python -m miniagent".to_string(),
            api_key: None,
            transcript_cap: 10_000,
        }
    }
}

/// Runs a headless agent CLI inside the task's reference image.
pub struct DockerAgent {
    config: DockerAgentConfig,
}

impl DockerAgent {
    pub fn new(config: DockerAgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentBackend for DockerAgent {
    async fn solve(&self, request: &SolveRequest) -> Result<AgentRun, AgentError> {
        validate_model_id(&request.model)?;

        let mut env = Vec::new();
        if let Some(key) = &self.config.api_key {
            env.push(("OPENROUTER_API_KEY".to_string(), key.clone()));
        }

        let mut sandbox =
            DockerSandbox::start(&request.image, "skill-agent", &request.task_id, &env)
                .await
                .map_err(|e| AgentError::Setup(e.to_string()))?;

        let result = self.solve_in_sandbox(&sandbox, request).await;
        sandbox.destroy().await;
        result
    }
}

impl DockerAgent {
    async fn solve_in_sandbox(
        &self,
        sandbox: &DockerSandbox,
        request: &SolveRequest,
    ) -> Result<AgentRun, AgentError> {
        sandbox
            .write_file(GUIDANCE_PATH, &request.guidance)
            .await
            .map_err(|e| AgentError::Setup(format!("failed to write guidance: {e}")))?;
        sandbox
            .write_file(PROBLEM_PATH, &request.objective)
            .await
            .map_err(|e| AgentError::Setup(format!("failed to write objective: {e}")))?;

        let agent_cmd = format!(
            "cd /testbed && {} --model '{}' --guidance {} --problem {} --workdir /testbed 2>&1",
            self.config.agent_cmd, request.model, GUIDANCE_PATH, PROBLEM_PATH
        );
        debug!(task_id = %request.task_id, "Running agent: {}", self.config.agent_cmd);

        let start = Instant::now();
        let run = sandbox.exec(&agent_cmd, request.timeout.as_secs()).await;
        let duration = start.elapsed();
        let transcript = truncate(
            &format!("{}\n{}", run.stdout, run.stderr),
            self.config.transcript_cap,
        );

        if run.exit_code != 0 && run.stderr.contains("timed out") {
            return Err(AgentError::Timeout {
                seconds: request.timeout.as_secs(),
            });
        }
        if run.exit_code != 0 {
            warn!(
                task_id = %request.task_id,
                exit_code = run.exit_code,
                "Agent exited non-zero (extracting changes anyway)"
            );
        }

        // The submission is whatever the agent changed in the working tree,
        // including new files.
        let diff = sandbox
            .exec("cd /testbed && git add -A && git diff --cached", 60)
            .await;
        let patch = if diff.success() { diff.stdout } else { String::new() };

        info!(
            task_id = %request.task_id,
            patch_chars = patch.len(),
            duration_secs = duration.as_secs(),
            "Agent run finished"
        );

        Ok(AgentRun {
            patch,
            transcript,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_model_id_accepts_provider_prefixed_ids() {
        assert!(validate_model_id("openai/gpt-5.2").is_ok());
        assert!(validate_model_id("anthropic/claude-opus-4.5:nitro").is_ok());
        assert!(validate_model_id("qwen2.5-coder_32b").is_ok());
    }

    #[test]
    fn validate_model_id_rejects_shell_metacharacters() {
        assert!(validate_model_id("gpt'; rm -rf /").is_err());
        assert!(validate_model_id("$(whoami)").is_err());
        assert!(validate_model_id("").is_err());
        assert!(validate_model_id(&"m".repeat(200)).is_err());
    }

    #[test]
    fn docker_agent_config_defaults() {
        let config = DockerAgentConfig::default();
        assert_eq!(config.agent_cmd, "python -m miniagent");
        assert_eq!(config.transcript_cap, 10_000);
        assert!(config.api_key.is_none());
    }
}
