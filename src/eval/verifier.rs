//! Patch verification against the task's reference environment.
//!
//! The core depends on verification only through [`TestBackend`]: apply a
//! patch and run a named test subset, returning pass/fail per test. The
//! production implementation applies the patch in a fresh container from
//! the task image and runs each test id individually.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::{validate_test_id, Task};
use crate::error::VerifierError;
use crate::sandbox::{truncate, DockerSandbox};

/// Bounds for one verification run.
#[derive(Debug, Clone, Copy)]
pub struct VerifyCaps {
    /// Maximum fail-to-pass tests executed.
    pub test_cap: usize,
    /// Wall-clock bound per test command.
    pub test_timeout_secs: u64,
    /// Whether pass-to-pass tests are also run.
    pub run_regressions: bool,
}

/// Pass/fail for one named test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    pub exit_code: i32,
    /// Truncated combined output, kept for diagnostics.
    pub output: String,
}

/// Result of applying a patch and running the task's tests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifyReport {
    /// Whether the patch applied cleanly.
    pub applied: bool,
    /// Apply failure detail when `applied` is false.
    pub apply_error: Option<String>,
    /// Outcome per attempted fail-to-pass test.
    pub fail_to_pass: Vec<TestOutcome>,
    /// Outcome per attempted pass-to-pass test (empty unless regressions run).
    pub pass_to_pass: Vec<TestOutcome>,
}

impl VerifyReport {
    /// Count of fail-to-pass tests now passing.
    pub fn passed(&self) -> usize {
        self.fail_to_pass.iter().filter(|t| t.passed).count()
    }

    /// Names of pass-to-pass tests the patch broke.
    pub fn regressions(&self) -> Vec<String> {
        self.pass_to_pass
            .iter()
            .filter(|t| !t.passed)
            .map(|t| t.name.clone())
            .collect()
    }
}

/// Capability contract for patch verification.
///
/// Implementations return `Err` only for infrastructure failures
/// (environment provisioning, docker unavailable); a failing test or an
/// unapplicable patch is a normal `Ok` report.
#[async_trait]
pub trait TestBackend: Send + Sync {
    async fn verify(
        &self,
        task: &Task,
        patch: &str,
        caps: VerifyCaps,
    ) -> Result<VerifyReport, VerifierError>;
}

/// Verifies patches in a fresh Docker container per call.
#[derive(Debug, Default)]
pub struct DockerVerifier;

impl DockerVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TestBackend for DockerVerifier {
    async fn verify(
        &self,
        task: &Task,
        patch: &str,
        caps: VerifyCaps,
    ) -> Result<VerifyReport, VerifierError> {
        let image = task.docker_image();
        let mut sandbox =
            DockerSandbox::start(&image, "skill-verify", &task.instance_id, &[])
                .await
                .map_err(|e| VerifierError::Provision(e.to_string()))?;

        let result = run_verification(&sandbox, task, patch, caps).await;
        sandbox.destroy().await;
        result
    }
}

async fn run_verification(
    sandbox: &DockerSandbox,
    task: &Task,
    patch: &str,
    caps: VerifyCaps,
) -> Result<VerifyReport, VerifierError> {
    sandbox
        .write_file("/tmp/solution.patch", patch)
        .await
        .map_err(|e| VerifierError::Infra(format!("failed to stage patch: {e}")))?;

    let apply = sandbox
        .exec(
            "cd /testbed && (git apply /tmp/solution.patch 2>&1 || patch -p1 --batch < /tmp/solution.patch 2>&1)",
            60,
        )
        .await;
    if !apply.success() {
        debug!(task_id = %task.instance_id, "Patch failed to apply");
        return Ok(VerifyReport {
            applied: false,
            apply_error: Some(truncate(
                &format!("{}\n{}", apply.stdout, apply.stderr),
                1000,
            )),
            ..Default::default()
        });
    }

    let mut report = VerifyReport {
        applied: true,
        ..Default::default()
    };

    for test_id in task.fail_to_pass.iter().take(caps.test_cap) {
        report
            .fail_to_pass
            .push(run_test(sandbox, test_id, caps.test_timeout_secs).await?);
    }

    if caps.run_regressions {
        for test_id in task.pass_to_pass.iter().take(caps.test_cap) {
            report
                .pass_to_pass
                .push(run_test(sandbox, test_id, caps.test_timeout_secs).await?);
        }
    }

    info!(
        task_id = %task.instance_id,
        passed = report.passed(),
        attempted = report.fail_to_pass.len(),
        regressions = report.regressions().len(),
        "Verification finished"
    );
    Ok(report)
}

async fn run_test(
    sandbox: &DockerSandbox,
    test_id: &str,
    timeout_secs: u64,
) -> Result<TestOutcome, VerifierError> {
    if let Err(e) = validate_test_id(test_id) {
        // A malformed test id is a dataset problem, not a test failure.
        return Err(VerifierError::Infra(e.to_string()));
    }
    let cmd = format!("cd /testbed && python -m pytest '{test_id}' -x --tb=no -q 2>&1");
    let output = sandbox.exec(&cmd, timeout_secs).await;
    Ok(TestOutcome {
        name: test_id.to_string(),
        passed: output.success(),
        exit_code: output.exit_code,
        output: truncate(&format!("{}\n{}", output.stdout, output.stderr), 2000),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, passed: bool) -> TestOutcome {
        TestOutcome {
            name: name.to_string(),
            passed,
            exit_code: i32::from(!passed),
            output: String::new(),
        }
    }

    #[test]
    fn report_counts_passed_tests() {
        let report = VerifyReport {
            applied: true,
            apply_error: None,
            fail_to_pass: vec![
                outcome("tests/a.py::t1", true),
                outcome("tests/a.py::t2", false),
                outcome("tests/a.py::t3", true),
            ],
            pass_to_pass: vec![],
        };
        assert_eq!(report.passed(), 2);
        assert!(report.regressions().is_empty());
    }

    #[test]
    fn report_lists_regressions() {
        let report = VerifyReport {
            applied: true,
            apply_error: None,
            fail_to_pass: vec![],
            pass_to_pass: vec![
                outcome("tests/b.py::stable", true),
                outcome("tests/b.py::broken", false),
            ],
        };
        assert_eq!(report.regressions(), vec!["tests/b.py::broken"]);
    }

    #[test]
    fn report_serialization_round_trip() {
        let report = VerifyReport {
            applied: false,
            apply_error: Some("corrupt patch at line 4".to_string()),
            fail_to_pass: vec![],
            pass_to_pass: vec![],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: VerifyReport = serde_json::from_str(&json).unwrap();
        assert!(!back.applied);
        assert_eq!(back.apply_error.as_deref(), Some("corrupt patch at line 4"));
    }
}
