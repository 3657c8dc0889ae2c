//! Configuration for evaluations.

use std::time::Duration;

/// Configuration threaded through the evaluator and search controller.
///
/// Carried explicitly rather than read ambiently, so concurrent evaluations
/// with different configurations (e.g. A/B testing agent models) stay
/// possible and testable in isolation.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Model identifier for the coding agent.
    pub agent_model: String,
    /// Wall-clock bound per agent invocation.
    pub eval_timeout: Duration,
    /// Wall-clock bound per individual test command.
    pub test_timeout: Duration,
    /// Maximum fail-to-pass tests run per verification.
    pub test_cap: usize,
    /// Bounded retries for verification infrastructure failures.
    pub verifier_retries: u32,
    /// Whether pass-to-pass tests are run to detect regressions.
    pub run_regressions: bool,
    /// Whether a detected regression blocks the `success` outcome.
    /// When false, regressions are logged and reported but not scored.
    pub regression_gate: bool,
    /// Maximum evaluations in flight at once.
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            agent_model: "openai/gpt-5.2".to_string(),
            eval_timeout: Duration::from_secs(900),
            test_timeout: Duration::from_secs(180),
            test_cap: 10,
            verifier_retries: 2,
            run_regressions: false,
            regression_gate: false,
            concurrency: 4,
        }
    }
}

impl EvalConfig {
    /// Creates a configuration for the given agent model.
    pub fn new(agent_model: impl Into<String>) -> Self {
        Self {
            agent_model: agent_model.into(),
            ..Default::default()
        }
    }

    /// Sets the per-evaluation timeout.
    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }

    /// Sets the per-test timeout.
    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    /// Sets the fail-to-pass test cap.
    pub fn with_test_cap(mut self, cap: usize) -> Self {
        self.test_cap = cap;
        self
    }

    /// Sets the verifier retry budget.
    pub fn with_verifier_retries(mut self, retries: u32) -> Self {
        self.verifier_retries = retries;
        self
    }

    /// Enables regression runs, optionally gating success on them.
    pub fn with_regressions(mut self, run: bool, gate: bool) -> Self {
        self.run_regressions = run;
        self.regression_gate = gate;
        self
    }

    /// Sets the evaluation concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.test_cap, 10);
        assert_eq!(config.verifier_retries, 2);
        assert_eq!(config.eval_timeout, Duration::from_secs(900));
        assert!(!config.regression_gate);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn builder() {
        let config = EvalConfig::new("anthropic/claude-opus-4.5")
            .with_eval_timeout(Duration::from_secs(600))
            .with_test_cap(5)
            .with_regressions(true, true)
            .with_concurrency(0);
        assert_eq!(config.agent_model, "anthropic/claude-opus-4.5");
        assert_eq!(config.eval_timeout, Duration::from_secs(600));
        assert_eq!(config.test_cap, 5);
        assert!(config.regression_gate);
        assert_eq!(config.concurrency, 1, "concurrency is clamped to >= 1");
    }
}
