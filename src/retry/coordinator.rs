//! Single-retry coordinator for failed workflow executions.
//!
//! Each failure event ends in exactly one [`Outcome`]. A lineage is retried
//! at most once: the retried execution carries the retry marker, so its own
//! failure escalates instead of retrying again. Every outcome except
//! `Ignored` makes exactly one notification attempt.

use crate::config::RetryConfig;
use crate::external::bounded;
use crate::notify::{dispatch, Notifier};
use crate::retry::event::{
    mark_retried, parse_payload, retry_execution_name, FailureEvent, RetryState,
    RETRY_TIMESTAMP_FORMAT,
};
use crate::retry::workflow::WorkflowClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Terminal result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Not a failure event.
    Ignored,
    /// The lineage already used its retry.
    Escalated,
    /// A new execution was started.
    Retriggered {
        execution_name: String,
        execution_id: String,
    },
    /// Starting the new execution failed.
    RetriggerFailed { error: String },
}

/// What the handler reports to its own caller.
///
/// Always status 200: failures are communicated through the notification
/// channel so the calling platform does not retry the handler itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    pub outcome: Outcome,
    /// Whether the notification was delivered. `false` for `Ignored`.
    pub notified: bool,
}

impl HandlerResponse {
    fn new(outcome: Outcome, body: String, notified: bool) -> Self {
        Self {
            status_code: 200,
            body,
            outcome,
            notified,
        }
    }
}

const UNKNOWN_DEFINITION: &str = "<unknown state machine>";

fn notice(notified: bool) -> &'static str {
    if notified {
        "Notification sent."
    } else {
        "Notification could not be delivered."
    }
}

/// Decides, starts, and reports the one retry.
pub struct RetryCoordinator {
    workflow: Arc<dyn WorkflowClient>,
    notifier: Arc<dyn Notifier>,
    config: RetryConfig,
    notify_timeout_secs: u64,
}

impl RetryCoordinator {
    pub fn new(
        workflow: Arc<dyn WorkflowClient>,
        notifier: Arc<dyn Notifier>,
        config: RetryConfig,
        notify_timeout_secs: u64,
    ) -> Self {
        Self {
            workflow,
            notifier,
            config,
            notify_timeout_secs,
        }
    }

    /// Handle one event using the current time for the retry marker.
    pub async fn handle_failure_event(&self, event: &FailureEvent) -> HandlerResponse {
        self.handle_at(event, Utc::now()).await
    }

    /// Handle one event as of `now`.
    pub async fn handle_at(&self, event: &FailureEvent, now: DateTime<Utc>) -> HandlerResponse {
        if !event.is_failed() {
            info!(
                "Ignoring event with status {}",
                event.detail.status.as_deref().unwrap_or("<none>")
            );
            return HandlerResponse::new(
                Outcome::Ignored,
                "Not a FAILED execution event. No action taken.".to_string(),
                false,
            );
        }

        let payload = parse_payload(event.detail.input.as_ref()).unwrap_or_else(|e| {
            warn!("Treating execution input as empty: {}", e);
            Default::default()
        });

        let definition = event.detail.state_machine_arn.as_deref();
        let original_name = event
            .detail
            .name
            .clone()
            .unwrap_or_else(|| self.config.default_name.clone());

        if let RetryState::AlreadyRetried(stamp) =
            RetryState::from_payload(&payload, &self.config.marker_field)
        {
            return self
                .escalate(definition.unwrap_or(UNKNOWN_DEFINITION), &original_name, &stamp)
                .await;
        }

        let stamp = now.format(RETRY_TIMESTAMP_FORMAT).to_string();
        let new_name = retry_execution_name(&original_name, &stamp, self.config.max_name_len);

        let Some(definition) = definition else {
            let error = "event has no stateMachineArn".to_string();
            return self
                .retrigger_failed(UNKNOWN_DEFINITION, &original_name, error)
                .await;
        };

        let input = serde_json::Value::Object(mark_retried(
            &payload,
            &self.config.marker_field,
            &stamp,
        ))
        .to_string();

        info!("Retriggering {} as {}", definition, new_name);

        let started = bounded(
            self.config.timeout_seconds,
            self.workflow.start_execution(definition, &new_name, &input),
        )
        .await;

        match started {
            Ok(execution_id) => {
                let message = format!(
                    "Step Function {} retriggered successfully. New execution name: {}",
                    definition, new_name
                );
                let notified =
                    dispatch(self.notifier.as_ref(), &message, self.notify_timeout_secs).await;
                info!("Started {}", execution_id);
                HandlerResponse::new(
                    Outcome::Retriggered {
                        execution_name: new_name.clone(),
                        execution_id,
                    },
                    format!(
                        "Step Function re-triggered once with execution name: {}. {}",
                        new_name,
                        notice(notified)
                    ),
                    notified,
                )
            }
            Err(e) => {
                self.retrigger_failed(definition, &original_name, e.to_string())
                    .await
            }
        }
    }

    async fn escalate(
        &self,
        definition: &str,
        original_name: &str,
        stamp: &str,
    ) -> HandlerResponse {
        warn!(
            "Execution {} of {} failed after retry (marker {})",
            original_name, definition, stamp
        );
        let message = format!(
            "Step Function {} failed again after retrigger. Execution: {}. \
             Even after retrigger, the Step Function was not successful.",
            definition, original_name
        );
        let notified = dispatch(self.notifier.as_ref(), &message, self.notify_timeout_secs).await;
        HandlerResponse::new(
            Outcome::Escalated,
            format!(
                "Already retriggered once. {} No further action taken.",
                notice(notified)
            ),
            notified,
        )
    }

    async fn retrigger_failed(
        &self,
        definition: &str,
        original_name: &str,
        error: String,
    ) -> HandlerResponse {
        warn!("Failed to retrigger {}: {}", definition, error);
        let message = format!(
            "Step Function {} failed to retrigger. Original execution: {}, error: {}",
            definition, original_name, error
        );
        let notified = dispatch(self.notifier.as_ref(), &message, self.notify_timeout_secs).await;
        HandlerResponse::new(
            Outcome::RetriggerFailed {
                error: error.clone(),
            },
            format!(
                "Failed to retrigger Step Function. {} Error: {}",
                notice(notified),
                error
            ),
            notified,
        )
    }
}
