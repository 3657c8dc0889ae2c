//! Reflective mutation of candidate skills.
//!
//! The search loop depends on mutation only through [`MutationBackend`]:
//! given a parent candidate and aggregated feedback from recent
//! evaluations, return one or more revised candidate texts. The production
//! implementation asks an LLM to rewrite the skill in light of what failed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::eval::EvalResult;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::sandbox::truncate;

const REFLECT_SYSTEM_PROMPT: &str = r#"You improve a SKILL.md file that is injected into the system prompt of a coding agent solving bug-fix tasks in a specific repository.

You are given the current skill text and feedback from recent evaluation runs: per task, whether the fix succeeded, which tests still fail, and a tail of the agent's transcript.

Revise the skill so the agent succeeds more often:
- Keep what evidently worked; change or remove guidance correlated with failures.
- Add concrete, repository-specific instructions (test commands, directory layout, pitfalls) that the feedback shows the agent was missing.
- Keep the YAML frontmatter structure (name, description) intact if present.
- Be specific and actionable; no generic advice that applies to every project.

Output ONLY the complete revised skill text, nothing else."#;

/// Bytes of per-task diagnostics included in the reflection prompt.
const FEEDBACK_DIAGNOSTIC_CAP: usize = 1500;

/// Capability contract for producing mutated candidates.
#[async_trait]
pub trait MutationBackend: Send + Sync {
    /// Produce one or more revised candidate texts from a parent and its
    /// recent evaluation feedback.
    async fn mutate(
        &self,
        parent: &str,
        objective: &str,
        feedback: &[EvalResult],
    ) -> Result<Vec<String>, LlmError>;
}

/// LLM-backed reflective mutator.
pub struct ReflectiveMutator {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl ReflectiveMutator {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }
}

/// Render evaluation feedback into the text block the reflection prompt sees.
pub fn render_feedback(feedback: &[EvalResult]) -> String {
    let mut out = String::new();
    for result in feedback {
        out.push_str(&format!(
            "## Task {}\noutcome: {}  score: {:.2}  tests: {}/{}\n",
            result.task_id, result.outcome, result.score, result.tests_passed, result.tests_total
        ));
        if !result.diagnostics.is_empty() {
            out.push_str(&truncate(&result.diagnostics, FEEDBACK_DIAGNOSTIC_CAP));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl MutationBackend for ReflectiveMutator {
    async fn mutate(
        &self,
        parent: &str,
        objective: &str,
        feedback: &[EvalResult],
    ) -> Result<Vec<String>, LlmError> {
        let user_msg = format!(
            "Objective: {objective}\n\n# Current skill\n\n{parent}\n\n# Evaluation feedback\n\n{}",
            render_feedback(feedback)
        );

        let request = GenerationRequest::new(
            &self.model,
            vec![
                Message::system(REFLECT_SYSTEM_PROMPT),
                Message::user(user_msg),
            ],
        )
        .with_temperature(0.8)
        .with_max_tokens(2000);

        let response = self.llm.generate(request).await?;
        let revised = response
            .first_content()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if revised.is_empty() {
            return Err(LlmError::EmptyResponse {
                model: self.model.clone(),
            });
        }

        debug!(chars = revised.len(), "Mutation produced revised skill");
        Ok(vec![revised])
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LlmError;
    use crate::eval::{EvalOutcome, EvalResult};
    use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider};

    use super::*;

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            // Echo back a marker plus proof the feedback reached the prompt.
            let user = &request.messages.last().unwrap().content;
            let content = format!("revised skill ({} prompt chars)", user.len());
            Ok(serde_json::from_value(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            }))
            .unwrap())
        }
    }

    fn feedback() -> Vec<EvalResult> {
        vec![EvalResult {
            task_id: "jinja.func_basic__x".to_string(),
            outcome: EvalOutcome::Partial,
            score: 0.5,
            tests_passed: 1,
            tests_total: 2,
            regressions: Vec::new(),
            diagnostics: "still failing: tests/test_core.py::test_nested".to_string(),
            patch_chars: 420,
            duration_secs: 33.0,
        }]
    }

    #[test]
    fn render_feedback_includes_outcome_and_diagnostics() {
        let text = render_feedback(&feedback());
        assert!(text.contains("jinja.func_basic__x"));
        assert!(text.contains("outcome: partial"));
        assert!(text.contains("tests: 1/2"));
        assert!(text.contains("still failing"));
    }

    #[test]
    fn render_feedback_truncates_long_diagnostics() {
        let mut fb = feedback();
        fb[0].diagnostics = "x".repeat(10_000);
        let text = render_feedback(&fb);
        assert!(text.contains("[truncated]"));
        assert!(text.len() < 5_000);
    }

    #[tokio::test]
    async fn mutate_returns_revised_text() {
        let mutator = ReflectiveMutator::new(std::sync::Arc::new(EchoLlm), "openai/gpt-5.2");
        let children = mutator
            .mutate("old skill", "maximize resolve rate on pallets/jinja", &feedback())
            .await
            .unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].starts_with("revised skill"));
    }
}
