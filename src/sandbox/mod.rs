//! Docker sandbox for isolated task environments.
//!
//! Each evaluation owns one ephemeral container started from the task's
//! reference image. SWE task images ship with the buggy repository checked
//! out at `/testbed`, so no cloning or dependency installation happens here.
//!
//! Teardown is guaranteed on every exit path: the normal flow calls
//! [`DockerSandbox::destroy`], and dropping an undestroyed sandbox (error
//! return, timeout cancellation) removes the container as a backstop.

use std::process::Stdio;

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

/// Shell command output from inside the container.
#[derive(Debug, Clone)]
pub struct SandboxOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl SandboxOutput {
    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Truncate a string to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

fn container_name(prefix: &str, task_id: &str) -> String {
    let safe: String = task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .collect();
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}-{}", truncate_name(&safe, 80), &nonce[..8])
}

fn truncate_name(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..max]
    }
}

/// An ephemeral Docker container for one evaluation.
pub struct DockerSandbox {
    container_name: String,
    destroyed: bool,
}

impl DockerSandbox {
    /// Start a new container from `image`, kept alive with a long sleep.
    ///
    /// `env` pairs are passed through to the container (e.g. the agent's
    /// API key); values never appear in the argv of commands run later.
    pub async fn start(
        image: &str,
        name_prefix: &str,
        task_id: &str,
        env: &[(String, String)],
    ) -> Result<Self> {
        let container_name = container_name(name_prefix, task_id);

        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            container_name.clone(),
            "-w".into(),
            "/testbed".into(),
        ];
        for (key, value) in env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(image.to_string());
        args.push("sleep".into());
        args.push("7200".into());

        let run_output = Command::new("docker").args(&args).output().await?;

        if !run_output.status.success() {
            anyhow::bail!(
                "Failed to start container '{}' from image '{}': {}",
                container_name,
                image,
                String::from_utf8_lossy(&run_output.stderr)
            );
        }

        debug!(container = %container_name, image = %image, "Container started");
        Ok(Self {
            container_name,
            destroyed: false,
        })
    }

    /// Container name, usable as an external handle.
    pub fn name(&self) -> &str {
        &self.container_name
    }

    /// Run a shell command inside the container with a timeout.
    ///
    /// Timeouts and spawn failures surface as exit code -1 with the reason
    /// in stderr, so callers can treat every result uniformly.
    pub async fn exec(&self, cmd: &str, timeout_secs: u64) -> SandboxOutput {
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            Command::new("docker")
                .args(["exec", &self.container_name, "bash", "-c", cmd])
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => SandboxOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Ok(Err(e)) => SandboxOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("exec error: {e}"),
            },
            Err(_) => SandboxOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("timed out after {timeout_secs}s"),
            },
        }
    }

    /// Write `content` to an absolute path inside the container via stdin.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let tee_cmd = format!("cat > '{path}'");
        let mut child = Command::new("docker")
            .args(["exec", "-i", &self.container_name, "bash", "-c", &tee_cmd])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(ref mut stdin) = child.stdin {
            stdin.write_all(content.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            anyhow::bail!(
                "write to '{}' failed: {}",
                path,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }

    /// Remove the container. Idempotent.
    pub async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Err(e) = Command::new("docker")
            .args(["rm", "-f", &self.container_name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            debug!(container = %self.container_name, error = %e, "Failed to remove container (may not exist)");
        }
    }
}

impl Drop for DockerSandbox {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        // Backstop for error/cancellation paths that skipped destroy().
        let name = self.container_name.clone();
        let spawned = std::process::Command::new("docker")
            .args(["rm", "-f", &name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = spawned {
            debug!(container = %name, error = %e, "Failed to spawn container cleanup");
        }
    }
}
