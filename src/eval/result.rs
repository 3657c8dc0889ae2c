//! Evaluation result types.

use serde::{Deserialize, Serialize};

/// Classification of one (candidate, task) evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalOutcome {
    /// All target tests pass and no gated regression.
    Success,
    /// Some but not all target tests pass, or a gated regression remains.
    Partial,
    /// Agent crashed or produced no patch.
    AgentFailure,
    /// Agent exceeded its wall-clock bound.
    Timeout,
    /// Patch could not be applied to the reference environment.
    PatchApplyFailure,
    /// Verification infrastructure failed after bounded retries.
    VerifierError,
}

impl std::fmt::Display for EvalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::AgentFailure => write!(f, "agent_failure"),
            Self::Timeout => write!(f, "timeout"),
            Self::PatchApplyFailure => write!(f, "patch_apply_failure"),
            Self::VerifierError => write!(f, "verifier_error"),
        }
    }
}

/// Result of scoring one candidate skill against one task.
///
/// `score` is the fraction of attempted fail-to-pass tests now passing, in
/// [0, 1]; every failure mode scores 0 rather than propagating an error.
/// `diagnostics` is free-form text for the mutation step: failing test
/// names, apply errors, the agent transcript tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub task_id: String,
    pub outcome: EvalOutcome,
    pub score: f64,
    pub tests_passed: usize,
    pub tests_total: usize,
    /// Names of pass-to-pass tests broken by the patch.
    pub regressions: Vec<String>,
    pub diagnostics: String,
    pub patch_chars: usize,
    pub duration_secs: f64,
}

impl EvalResult {
    /// A zero-scoring result for a failure stage.
    pub fn failure(
        task_id: impl Into<String>,
        outcome: EvalOutcome,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            outcome,
            score: 0.0,
            tests_passed: 0,
            tests_total: 0,
            regressions: Vec::new(),
            diagnostics: diagnostics.into(),
            patch_chars: 0,
            duration_secs: 0.0,
        }
    }

    /// Returns true if the task counts as fully resolved.
    pub fn resolved(&self) -> bool {
        matches!(self.outcome, EvalOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_display_is_snake_case() {
        assert_eq!(EvalOutcome::Success.to_string(), "success");
        assert_eq!(EvalOutcome::AgentFailure.to_string(), "agent_failure");
        assert_eq!(
            EvalOutcome::PatchApplyFailure.to_string(),
            "patch_apply_failure"
        );
        assert_eq!(EvalOutcome::VerifierError.to_string(), "verifier_error");
    }

    #[test]
    fn failure_constructor_scores_zero() {
        let r = EvalResult::failure("t-1", EvalOutcome::Timeout, "agent timed out");
        assert_eq!(r.score, 0.0);
        assert_eq!(r.outcome, EvalOutcome::Timeout);
        assert!(!r.resolved());
    }

    #[test]
    fn result_serializes_outcome_snake_case() {
        let r = EvalResult::failure("t-1", EvalOutcome::PatchApplyFailure, "bad diff");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"patch_apply_failure\""));
        assert!(json.contains("\"task_id\":\"t-1\""));
    }
}
