//! Workflow execution platform client.

use crate::config::RetryConfig;
use crate::external::{AwsCli, UpstreamError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

/// Starts executions of a workflow definition.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Start `definition_id` as `execution_name` with a JSON-encoded input.
    /// Returns the new execution's identifier.
    async fn start_execution(
        &self,
        definition_id: &str,
        execution_name: &str,
        input: &str,
    ) -> Result<String, UpstreamError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionOutput {
    execution_arn: String,
}

/// Step Functions through `aws stepfunctions start-execution`.
#[derive(Debug, Clone)]
pub struct StepFunctionsCliClient {
    cli: AwsCli,
}

impl StepFunctionsCliClient {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            cli: AwsCli::new(config.aws_profile.clone(), config.timeout_seconds),
        }
    }
}

/// Arguments for `aws stepfunctions start-execution`.
pub fn start_execution_args(definition_id: &str, execution_name: &str, input: &str) -> Vec<String> {
    vec![
        "stepfunctions".to_string(),
        "start-execution".to_string(),
        "--state-machine-arn".to_string(),
        definition_id.to_string(),
        "--name".to_string(),
        execution_name.to_string(),
        "--input".to_string(),
        input.to_string(),
        "--output".to_string(),
        "json".to_string(),
    ]
}

fn parse_start_output(stdout: &str) -> Result<String, UpstreamError> {
    let output: StartExecutionOutput = serde_json::from_str(stdout)
        .map_err(|e| UpstreamError::InvalidResponse(format!("start-execution output: {}", e)))?;
    Ok(output.execution_arn)
}

#[async_trait]
impl WorkflowClient for StepFunctionsCliClient {
    async fn start_execution(
        &self,
        definition_id: &str,
        execution_name: &str,
        input: &str,
    ) -> Result<String, UpstreamError> {
        let stdout = self
            .cli
            .run(&start_execution_args(definition_id, execution_name, input))
            .await?;
        parse_start_output(&stdout)
    }
}

/// Logs the start request and returns a placeholder identifier.
#[derive(Debug, Default, Clone)]
pub struct DryRunWorkflowClient;

#[async_trait]
impl WorkflowClient for DryRunWorkflowClient {
    async fn start_execution(
        &self,
        definition_id: &str,
        execution_name: &str,
        input: &str,
    ) -> Result<String, UpstreamError> {
        info!(
            "Dry run: would start {} as {} with input {}",
            definition_id, execution_name, input
        );
        Ok(format!("dry-run:{}", execution_name))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_execution_args() {
        let args = start_execution_args("arn:sm", "run_20250804T101500", r#"{"a":1}"#);
        assert_eq!(&args[..2], &["stepfunctions", "start-execution"]);
        assert_eq!(args[3], "arn:sm");
        assert_eq!(args[5], "run_20250804T101500");
        assert_eq!(args[7], r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_start_output() {
        let stdout = r#"{
            "executionArn": "arn:aws:states:us-east-1:1:execution:sm:run",
            "startDate": "2025-08-04T10:15:00Z"
        }"#;
        assert_eq!(
            parse_start_output(stdout).unwrap(),
            "arn:aws:states:us-east-1:1:execution:sm:run"
        );
        assert!(matches!(
            parse_start_output("not json"),
            Err(UpstreamError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_dry_run_client_never_fails() {
        let id = tokio_test::block_on(DryRunWorkflowClient.start_execution("arn:sm", "run", "{}"))
            .unwrap();
        assert_eq!(id, "dry-run:run");
    }
}
