//! Top-level pipeline orchestration.
//!
//! Wires the external collaborators (corpus source, LLM endpoint, Docker
//! backends) to the core search loop: load and split the corpus, generate
//! the seed skill, optimize under the evaluation budget, validate the
//! winner on the held-out split, and write the artifact.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::agent::{DockerAgent, DockerAgentConfig};
use crate::corpus::{validate_repo_name, CorpusClient};
use crate::eval::{DockerVerifier, EvalConfig, Evaluator};
use crate::llm::OpenRouterClient;
use crate::search::{ReflectiveMutator, SearchConfig, SearchController, SearchOutcome};
use crate::skill::{save_skill, SeedGenerator};

/// Hard default for the coding agent's model.
pub const DEFAULT_AGENT_MODEL: &str = "openai/gpt-5.2";
/// Environment fallback for the agent model.
pub const AGENT_MODEL_ENV: &str = "SKILL_FORGE_AGENT_MODEL";
/// Hard default for the seed/mutation model.
pub const DEFAULT_SKILL_MODEL: &str = "openai/gpt-5.2";
/// Environment fallback for the seed/mutation model.
pub const SKILL_MODEL_ENV: &str = "SKILL_FORGE_SKILL_MODEL";

/// Options for one end-to-end run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// GitHub URL or bare `owner/repo`.
    pub repo_url: String,
    /// Base directory for the written SKILL.md.
    pub output_dir: PathBuf,
    /// Evaluation budget.
    pub max_evals: usize,
    /// Whether to generate a seed skill from repository metadata.
    pub use_initial_skill: bool,
    /// Agent model override (falls back to env, then the hard default).
    pub agent_model: Option<String>,
    /// Seed/mutation model override (falls back to env, then the hard default).
    pub skill_model: Option<String>,
    /// OpenAI-compatible base URL override for local models.
    pub base_url: Option<String>,
    /// Concurrent evaluations.
    pub concurrency: usize,
    /// Per-evaluation wall-clock bound, seconds.
    pub eval_timeout_secs: u64,
    /// Maximum fail-to-pass tests per verification.
    pub test_cap: usize,
    /// RNG seed for the task sampling schedule.
    pub seed: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            output_dir: PathBuf::from(".claude/skills"),
            max_evals: 150,
            use_initial_skill: true,
            agent_model: None,
            skill_model: None,
            base_url: None,
            concurrency: 4,
            eval_timeout_secs: 900,
            test_cap: 10,
            seed: 0,
        }
    }
}

/// Result of one end-to-end run.
#[derive(Debug)]
pub struct PipelineReport {
    pub repo: String,
    pub skill_path: PathBuf,
    pub outcome: SearchOutcome,
}

/// Extract `owner/repo` from a GitHub URL, or validate a bare slug.
pub fn extract_repo_name(repo_url: &str) -> Result<String> {
    let url = repo_url.trim_end_matches('/');
    let slug = if let Some(rest) = url.split("github.com/").nth(1) {
        let mut parts = rest.split('/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                format!("{owner}/{}", repo.trim_end_matches(".git"))
            }
            _ => anyhow::bail!("could not parse 'owner/repo' from URL '{repo_url}'"),
        }
    } else {
        url.to_string()
    };
    validate_repo_name(&slug)?;
    Ok(slug)
}

fn resolve_model(flag: Option<String>, env_var: &str, hard_default: &str) -> String {
    flag.filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| hard_default.to_string())
}

/// Run the full pipeline for a repository.
pub async fn run(options: RunOptions) -> Result<PipelineReport> {
    let repo_name = extract_repo_name(&options.repo_url)?;
    info!(repo = %repo_name, "Starting skill optimization");

    // Fatal before any budget is spent: empty corpus, missing credentials.
    let splits = CorpusClient::new()
        .load_splits(&repo_name)
        .await
        .context("failed to load task corpus")?;
    info!(
        train = splits.train.len(),
        val = splits.val.len(),
        test = splits.test.len(),
        "Corpus split"
    );

    let llm = Arc::new(
        OpenRouterClient::from_env_with_base(options.base_url.as_deref())
            .context("LLM credentials are required for mutation")?,
    );
    let agent_model = resolve_model(
        options.agent_model.clone(),
        AGENT_MODEL_ENV,
        DEFAULT_AGENT_MODEL,
    );
    let skill_model = resolve_model(
        options.skill_model.clone(),
        SKILL_MODEL_ENV,
        DEFAULT_SKILL_MODEL,
    );

    let seed_skill = if options.use_initial_skill {
        let (owner, repo) = repo_name
            .split_once('/')
            .expect("slug validated as owner/repo");
        SeedGenerator::new(llm.clone(), &skill_model)
            .generate(owner, repo)
            .await
            .context("seed skill generation failed")?
    } else {
        info!("Skipping seed skill generation");
        String::new()
    };

    let eval_config = EvalConfig::new(&agent_model)
        .with_eval_timeout(Duration::from_secs(options.eval_timeout_secs))
        .with_test_cap(options.test_cap)
        .with_concurrency(options.concurrency);
    let agent = Arc::new(DockerAgent::new(DockerAgentConfig {
        api_key: std::env::var("OPENROUTER_API_KEY").ok(),
        ..Default::default()
    }));
    let evaluator = Arc::new(Evaluator::new(agent, Arc::new(DockerVerifier::new()), eval_config));
    let mutator = Arc::new(ReflectiveMutator::new(llm, &skill_model));

    let search_config = SearchConfig {
        budget: options.max_evals,
        seed: options.seed,
        objective: format!(
            "Maximize the resolve rate on software engineering tasks for the {repo_name} \
             repository. The skill should help the coding agent understand the repo's test \
             commands, code structure, and common patterns."
        ),
        ..Default::default()
    };
    let controller = SearchController::new(evaluator, mutator, search_config);
    let outcome = controller
        .run(seed_skill, &splits.train, &splits.val)
        .await;

    let skill_path = save_skill(&outcome.best_skill, &repo_name, &options.output_dir)?;
    info!(
        path = %skill_path.display(),
        train_score = outcome.train_score,
        val_score = ?outcome.val_score,
        low_confidence = outcome.low_confidence,
        "Skill written"
    );

    Ok(PipelineReport {
        repo: repo_name,
        skill_path,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_repo_name_from_url() {
        assert_eq!(
            extract_repo_name("https://github.com/pallets/jinja").unwrap(),
            "pallets/jinja"
        );
        assert_eq!(
            extract_repo_name("https://github.com/pallets/jinja/").unwrap(),
            "pallets/jinja"
        );
        assert_eq!(
            extract_repo_name("https://github.com/pallets/jinja.git").unwrap(),
            "pallets/jinja"
        );
    }

    #[test]
    fn extract_repo_name_passes_through_slugs() {
        assert_eq!(extract_repo_name("pallets/jinja").unwrap(), "pallets/jinja");
    }

    #[test]
    fn extract_repo_name_rejects_invalid() {
        assert!(extract_repo_name("justarepo").is_err());
        assert!(extract_repo_name("https://github.com/onlyowner").is_err());
        assert!(extract_repo_name("owner/repo; rm -rf /").is_err());
    }

    #[test]
    fn resolve_model_prefers_flag_then_env_then_default() {
        // Unlikely-to-exist env var keeps this test hermetic.
        let env_var = "SKILL_FORGE_TEST_MODEL_UNSET";
        assert_eq!(
            resolve_model(Some("flag/model".into()), env_var, "default/model"),
            "flag/model"
        );
        assert_eq!(
            resolve_model(Some(String::new()), env_var, "default/model"),
            "default/model"
        );
        assert_eq!(resolve_model(None, env_var, "default/model"), "default/model");
    }

    #[test]
    fn run_options_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.max_evals, 150);
        assert_eq!(options.test_cap, 10);
        assert!(options.use_initial_skill);
        assert_eq!(options.output_dir, PathBuf::from(".claude/skills"));
    }
}
