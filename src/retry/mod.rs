//! Retry-once coordination for failed workflow executions.

pub mod coordinator;
pub mod event;
pub mod workflow;

pub use coordinator::{HandlerResponse, Outcome, RetryCoordinator};
pub use event::FailureEvent;
pub use workflow::{DryRunWorkflowClient, StepFunctionsCliClient, WorkflowClient};
