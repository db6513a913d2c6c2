//! Shared plumbing for external collaborators.
//!
//! Every network or subprocess call made on behalf of the analyzer or the
//! retry coordinator reports failure as an [`UpstreamError`] and runs under
//! an explicit timeout.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure of a call to a collaborator outside this process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("command failed: {0}")]
    Command(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl UpstreamError {
    /// Classify a reqwest failure the way users need to read it.
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(timeout_secs)
        } else if err.is_connect() {
            UpstreamError::Request(format!("cannot connect to {}", endpoint))
        } else {
            UpstreamError::Request(err.to_string())
        }
    }
}

/// Run `fut`, turning an elapsed deadline into [`UpstreamError::Timeout`].
pub async fn bounded<F, T>(timeout_secs: u64, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(timeout_secs)),
    }
}

/// Thin runner for the `aws` command-line client.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    profile: Option<String>,
    timeout_secs: u64,
}

impl AwsCli {
    pub fn new(profile: Option<String>, timeout_secs: u64) -> Self {
        Self {
            program: "aws".to_string(),
            profile,
            timeout_secs,
        }
    }

    /// Use a different executable, e.g. a wrapper script.
    #[cfg(test)]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run `aws <args> [--profile P]` and return stdout.
    pub async fn run(&self, args: &[String]) -> Result<String, UpstreamError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);
        if let Some(ref profile) = self.profile {
            cmd.arg("--profile").arg(profile);
        }

        let label = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        debug!("Running {} {}", self.program, label);

        let output = bounded(self.timeout_secs, async {
            cmd.output()
                .await
                .map_err(|e| UpstreamError::Command(format!("cannot run {}: {}", self.program, e)))
        })
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UpstreamError::Command(format!(
                "{} {} exited with {}: {}",
                self.program,
                label,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| UpstreamError::InvalidResponse(format!("non-UTF-8 output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let value = bounded(1, async { Ok::<_, UpstreamError>(7) }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(1, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, UpstreamError>(())
        })
        .await;
        assert_eq!(result, Err(UpstreamError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_command_error() {
        let cli = AwsCli::new(None, 5).with_program("spikewatch-no-such-binary");
        let err = cli.run(&["ce".to_string()]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Command(_)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(UpstreamError::Timeout(30).to_string(), "timed out after 30s");
        assert_eq!(
            UpstreamError::Api {
                status: 401,
                body: "unauthorized".to_string()
            }
            .to_string(),
            "API error 401: unauthorized"
        );
    }
}
