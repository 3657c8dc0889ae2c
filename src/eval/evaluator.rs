//! The fitness function: score one candidate skill against one task.
//!
//! `evaluate` never returns an error. Every backend fault (agent crash,
//! timeout, malformed patch, flaky infrastructure) is caught here and
//! converted into a scored [`EvalResult`] so a single bad evaluation can
//! never abort the surrounding search loop.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::agent::{AgentBackend, AgentRun, SolveRequest};
use crate::corpus::Task;
use crate::error::AgentError;
use crate::sandbox::truncate;

use super::config::EvalConfig;
use super::result::{EvalOutcome, EvalResult};
use super::verifier::{TestBackend, VerifyCaps, VerifyReport};

/// Bytes of agent transcript retained in diagnostics.
const TRANSCRIPT_TAIL: usize = 2000;

/// Scores candidate skills by driving the agent and verifier backends.
///
/// Stateless between calls: a pure function of (candidate, task) modulo the
/// side effects of the external backends.
pub struct Evaluator {
    agent: Arc<dyn AgentBackend>,
    tests: Arc<dyn TestBackend>,
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(
        agent: Arc<dyn AgentBackend>,
        tests: Arc<dyn TestBackend>,
        config: EvalConfig,
    ) -> Self {
        Self {
            agent,
            tests,
            config,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate one candidate skill on one task.
    pub async fn evaluate(&self, candidate: &str, task: &Task) -> EvalResult {
        let start = Instant::now();
        let mut result = self.evaluate_inner(candidate, task).await;
        result.duration_secs = start.elapsed().as_secs_f64();

        info!(
            task_id = %task.instance_id,
            outcome = %result.outcome,
            score = result.score,
            tests = format!("{}/{}", result.tests_passed, result.tests_total),
            "Evaluation finished"
        );
        result
    }

    async fn evaluate_inner(&self, candidate: &str, task: &Task) -> EvalResult {
        if !task.has_target_tests() {
            return EvalResult::failure(
                &task.instance_id,
                EvalOutcome::VerifierError,
                "task has no fail-to-pass tests",
            );
        }

        // Stage 1-2: run the agent under its wall-clock bound.
        let request = SolveRequest {
            guidance: candidate.to_string(),
            objective: task.problem_statement.clone(),
            model: self.config.agent_model.clone(),
            image: task.docker_image(),
            task_id: task.instance_id.clone(),
            timeout: self.config.eval_timeout,
        };

        let run = match self.agent.solve(&request).await {
            Ok(run) => run,
            Err(AgentError::Timeout { seconds }) => {
                return EvalResult::failure(
                    &task.instance_id,
                    EvalOutcome::Timeout,
                    format!("agent timed out after {seconds}s"),
                );
            }
            Err(e) => {
                return EvalResult::failure(
                    &task.instance_id,
                    EvalOutcome::AgentFailure,
                    format!("agent error: {e}"),
                );
            }
        };

        // Stage 3: the agent must have produced a patch.
        if run.patch.trim().is_empty() {
            return EvalResult::failure(
                &task.instance_id,
                EvalOutcome::AgentFailure,
                format!(
                    "agent produced no patch\n--- transcript tail ---\n{}",
                    truncate(&run.transcript, TRANSCRIPT_TAIL)
                ),
            );
        }

        // Stage 4-5: apply and test, retrying infrastructure failures.
        let caps = VerifyCaps {
            test_cap: self.config.test_cap,
            test_timeout_secs: self.config.test_timeout.as_secs(),
            run_regressions: self.config.run_regressions,
        };
        let report = match self.verify_with_retries(task, &run.patch, caps).await {
            Ok(report) => report,
            Err(diagnostics) => {
                return EvalResult::failure(
                    &task.instance_id,
                    EvalOutcome::VerifierError,
                    diagnostics,
                );
            }
        };

        if !report.applied {
            let mut result = EvalResult::failure(
                &task.instance_id,
                EvalOutcome::PatchApplyFailure,
                format!(
                    "patch failed to apply: {}",
                    report.apply_error.as_deref().unwrap_or("unknown error")
                ),
            );
            result.patch_chars = run.patch.len();
            return result;
        }

        // Stage 6: score.
        self.score(task, &run, &report)
    }

    async fn verify_with_retries(
        &self,
        task: &Task,
        patch: &str,
        caps: VerifyCaps,
    ) -> Result<VerifyReport, String> {
        let attempts = self.config.verifier_retries + 1;
        let mut last_error = String::new();
        for attempt in 0..attempts {
            match self.tests.verify(task, patch, caps).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!(
                        task_id = %task.instance_id,
                        attempt,
                        error = %e,
                        "Verification infrastructure failure"
                    );
                    last_error = e.to_string();
                }
            }
        }
        Err(format!(
            "verification failed after {attempts} attempts: {last_error}"
        ))
    }

    fn score(&self, task: &Task, run: &AgentRun, report: &VerifyReport) -> EvalResult {
        let tests_total = report.fail_to_pass.len();
        let tests_passed = report.passed();
        let score = if tests_total == 0 {
            0.0
        } else {
            tests_passed as f64 / tests_total as f64
        };
        let regressions = report.regressions();

        let fully_resolved = (score - 1.0).abs() < f64::EPSILON;
        let regression_ok = !self.config.regression_gate || regressions.is_empty();
        let outcome = if fully_resolved && regression_ok {
            EvalOutcome::Success
        } else {
            EvalOutcome::Partial
        };

        let mut diagnostics = String::new();
        let failing: Vec<&str> = report
            .fail_to_pass
            .iter()
            .filter(|t| !t.passed)
            .map(|t| t.name.as_str())
            .collect();
        if !failing.is_empty() {
            diagnostics.push_str(&format!("still failing: {}\n", failing.join(", ")));
        }
        if !regressions.is_empty() {
            diagnostics.push_str(&format!("regressions: {}\n", regressions.join(", ")));
        }
        if outcome != EvalOutcome::Success {
            diagnostics.push_str(&format!(
                "--- transcript tail ---\n{}",
                truncate(&run.transcript, TRANSCRIPT_TAIL)
            ));
        }

        EvalResult {
            task_id: task.instance_id.clone(),
            outcome,
            score,
            tests_passed,
            tests_total,
            regressions,
            diagnostics,
            patch_chars: run.patch.len(),
            duration_secs: 0.0,
        }
    }
}
