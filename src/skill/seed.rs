//! Seed skill generation from repository metadata.
//!
//! Fetches the README and one build/test config file from the GitHub
//! contents API, then asks a model to synthesize an initial SKILL.md with
//! repo-specific guidance. The result seeds the search; an empty seed is a
//! valid alternative when static analysis is disabled.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SkillError;
use crate::llm::{GenerationRequest, LlmProvider, Message};

use super::skill_name;

/// Config files probed for test/build information, in preference order.
/// The first one present is included in the generation prompt.
const CONFIG_PROBES: &[&str] = &[
    "pyproject.toml",
    "setup.cfg",
    "tox.ini",
    "Makefile",
    "pytest.ini",
];

const README_CHAR_CAP: usize = 3000;
const CONFIG_CHAR_CAP: usize = 1500;

/// Minimal GitHub contents API client.
pub struct GithubClient {
    http_client: Client,
}

impl GithubClient {
    pub fn new() -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("skill-forge/0.1")
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Fetch the repository README, truncated. Best effort: any failure
    /// yields an empty string, since a seed can be generated without it.
    pub async fn fetch_readme(&self, owner: &str, repo: &str) -> String {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/readme");
        self.fetch_content(&url, README_CHAR_CAP).await.unwrap_or_default()
    }

    /// Fetch a specific file, truncated. Best effort.
    pub async fn fetch_file(&self, owner: &str, repo: &str, path: &str) -> String {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/contents/{path}");
        self.fetch_content(&url, CONFIG_CHAR_CAP).await.unwrap_or_default()
    }

    async fn fetch_content(&self, url: &str, cap: usize) -> Option<String> {
        #[derive(Deserialize)]
        struct ContentsResponse {
            content: Option<String>,
            encoding: Option<String>,
        }

        let response = self.http_client.get(url).send().await.ok()?;
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "GitHub contents fetch failed");
            return None;
        }
        let body: ContentsResponse = response.json().await.ok()?;
        if body.encoding.as_deref() != Some("base64") {
            return None;
        }
        let raw: String = body.content?.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(raw).ok()?;
        let text = String::from_utf8_lossy(&bytes);
        Some(text.chars().take(cap).collect())
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates the initial candidate skill for a repository.
pub struct SeedGenerator {
    llm: Arc<dyn LlmProvider>,
    model: String,
    github: GithubClient,
}

impl SeedGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            github: GithubClient::new(),
        }
    }

    /// Generate a SKILL.md seed for `owner/repo`.
    pub async fn generate(&self, owner: &str, repo: &str) -> Result<String, SkillError> {
        let name = skill_name(repo)?;
        let readme = self.github.fetch_readme(owner, repo).await;

        let mut extra_context = String::new();
        for probe in CONFIG_PROBES {
            let content = self.github.fetch_file(owner, repo, probe).await;
            if !content.is_empty() {
                extra_context = format!("\n\n### {probe}\n```\n{content}\n```");
                break;
            }
        }

        let prompt = seed_prompt(owner, repo, &name, &readme, &extra_context);
        let request = GenerationRequest::new(&self.model, vec![Message::user(prompt)])
            .with_max_tokens(2000);
        let response = self.llm.generate(request).await?;
        let content = response
            .first_content()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if content.is_empty() {
            return Err(SkillError::Fetch(format!(
                "model '{}' returned an empty seed skill",
                self.model
            )));
        }

        info!(repo = %format!("{owner}/{repo}"), chars = content.len(), "Seed skill generated");
        Ok(content)
    }
}

fn seed_prompt(owner: &str, repo: &str, name: &str, readme: &str, extra: &str) -> String {
    format!(
        r#"You are generating a SKILL.md for the '{repo}' repository.
This skill file will be injected into the system prompt of a coding agent that must
solve bug reports by modifying source files in a Docker container at /testbed.

Repository: https://github.com/{owner}/{repo}

README (may be truncated):
{readme}
{extra}

Output a complete SKILL.md starting with YAML frontmatter, then the body. Use exactly this structure:

---
name: {name}
description: <one-sentence description, max 1024 characters, no angle-bracket XML tags, stating what the skill covers and when to use it>
---

<body: 400-800 words covering the five sections below>

The body must cover:

1. **Test commands**: The exact command(s) to run the test suite and single tests.
2. **Code structure**: Key directories and files an agent should know about.
3. **Conventions**: Code style, naming patterns, or idioms specific to this project.
4. **Common pitfalls**: Mistakes an agent typically makes on this repo and how to avoid them.
5. **Workflow**: Recommended steps to diagnose and fix an issue (reproduce, patch, verify).

Constraints:
- The `name` field must be exactly: {name}
- The `description` must be non-empty, at most 1024 characters, and must not contain angle-bracket XML tags.
- Be specific and actionable. Write for an AI agent, not a human developer.
- Do NOT include generic advice that applies to all projects.
- Focus on what is distinctive about {repo}."#
    )
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::{GenerationResponse, LlmProvider};

    use super::*;

    struct CannedLlm(String);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            Ok(serde_json::from_value(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": self.0}}]
            }))
            .unwrap())
        }
    }

    #[test]
    fn seed_prompt_pins_name_and_structure() {
        let prompt = seed_prompt("pallets", "jinja", "jinja", "A template engine", "");
        assert!(prompt.contains("name: jinja"));
        assert!(prompt.contains("The `name` field must be exactly: jinja"));
        assert!(prompt.contains("Test commands"));
        assert!(prompt.contains("/testbed"));
    }

    #[tokio::test]
    async fn generate_returns_model_output() {
        let generator = SeedGenerator::new(
            Arc::new(CannedLlm("---\nname: jinja\n---\nbody".to_string())),
            "openai/gpt-5.2",
        );
        // GithubClient calls fail fast offline and fall back to empty context.
        let skill = generator.generate("pallets", "jinja").await.unwrap();
        assert!(skill.starts_with("---"));
    }

    #[tokio::test]
    async fn generate_rejects_empty_model_output() {
        let generator = SeedGenerator::new(Arc::new(CannedLlm("  ".to_string())), "m");
        assert!(generator.generate("pallets", "jinja").await.is_err());
    }
}
