//! Workflow failure events and the retry marker they carry.
//!
//! The retry state of an execution lineage lives in the execution's own
//! input payload: the marker field is absent until the one retry is started,
//! and is copied into the retried execution's input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Timestamp format of the retry marker and the execution name suffix.
pub const RETRY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Shortest execution name that still fits `_` plus a full timestamp.
pub const MIN_EXECUTION_NAME_LEN: usize = 16;

/// Status value that triggers the coordinator.
pub const FAILED_STATUS: &str = "FAILED";

/// JSON object passed as execution input.
pub type Payload = Map<String, Value>;

/// An execution status change notification (EventBridge shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureEvent {
    #[serde(default)]
    pub detail: EventDetail,
}

/// The `detail` block of a status change event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(default)]
    pub status: Option<String>,
    /// Workflow definition the execution belongs to.
    #[serde(default)]
    pub state_machine_arn: Option<String>,
    #[serde(default)]
    pub execution_arn: Option<String>,
    /// Execution name.
    #[serde(default)]
    pub name: Option<String>,
    /// Execution input. Normally a JSON-encoded string.
    #[serde(default)]
    pub input: Option<Value>,
}

impl FailureEvent {
    pub fn is_failed(&self) -> bool {
        self.detail.status.as_deref() == Some(FAILED_STATUS)
    }
}

/// Why an execution input could not be used as a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadParseError {
    #[error("input is not valid JSON: {0}")]
    Json(String),
    #[error("input is not a JSON object")]
    NotAnObject,
}

/// Decode the execution input into a JSON object.
///
/// A missing input is an empty payload.
pub fn parse_payload(input: Option<&Value>) -> Result<Payload, PayloadParseError> {
    let value = match input {
        None | Some(Value::Null) => return Ok(Payload::new()),
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|e| PayloadParseError::Json(e.to_string()))?
        }
        Some(other) => other.clone(),
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(PayloadParseError::NotAnObject),
    }
}

/// Whether this lineage has already used its one retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    NotYetRetried,
    /// Holds the marker value, typically the retry timestamp.
    AlreadyRetried(String),
}

impl RetryState {
    /// Read the state from a payload. Only the marker's presence matters.
    pub fn from_payload(payload: &Payload, marker_field: &str) -> Self {
        match payload.get(marker_field) {
            None => RetryState::NotYetRetried,
            Some(Value::String(s)) => RetryState::AlreadyRetried(s.clone()),
            Some(other) => RetryState::AlreadyRetried(other.to_string()),
        }
    }
}

/// Copy of `payload` with the marker set to `stamp`.
pub fn mark_retried(payload: &Payload, marker_field: &str, stamp: &str) -> Payload {
    let mut marked = payload.clone();
    marked.insert(marker_field.to_string(), Value::String(stamp.to_string()));
    marked
}

/// `{original}_{stamp}`, keeping the last `max_len` characters so the
/// timestamp suffix always survives.
pub fn retry_execution_name(original: &str, stamp: &str, max_len: usize) -> String {
    let full = format!("{}_{}", original, stamp);
    let len = full.chars().count();
    if len <= max_len {
        return full;
    }
    full.chars().skip(len - max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EVENT: &str = include_str!("../../fixtures/failure_event.json");

    #[test]
    fn test_parse_fixture_event() {
        let event: FailureEvent = serde_json::from_str(EVENT).unwrap();
        assert!(event.is_failed());
        assert_eq!(event.detail.name.as_deref(), Some("nightly-etl-2025-08-04"));
        assert!(event
            .detail
            .state_machine_arn
            .as_deref()
            .unwrap()
            .ends_with(":stateMachine:nightly-etl"));
    }

    #[test]
    fn test_event_without_detail_is_not_failed() {
        let event: FailureEvent = serde_json::from_str("{}").unwrap();
        assert!(!event.is_failed());
    }

    #[test]
    fn test_parse_payload_variants() {
        assert_eq!(parse_payload(None).unwrap(), Payload::new());

        let from_string = parse_payload(Some(&json!(r#"{"job":"etl"}"#))).unwrap();
        assert_eq!(from_string["job"], "etl");

        let from_object = parse_payload(Some(&json!({"job": "etl"}))).unwrap();
        assert_eq!(from_object, from_string);

        assert!(matches!(
            parse_payload(Some(&json!("{broken"))),
            Err(PayloadParseError::Json(_))
        ));
        assert_eq!(
            parse_payload(Some(&json!("[1, 2]"))),
            Err(PayloadParseError::NotAnObject)
        );
    }

    #[test]
    fn test_retry_state_from_marker_presence() {
        let mut payload = Payload::new();
        assert_eq!(
            RetryState::from_payload(&payload, "rerun_date_time_stamp"),
            RetryState::NotYetRetried
        );

        payload.insert("rerun_date_time_stamp".to_string(), json!(""));
        assert_eq!(
            RetryState::from_payload(&payload, "rerun_date_time_stamp"),
            RetryState::AlreadyRetried(String::new())
        );
    }

    #[test]
    fn test_mark_retried_keeps_original_fields() {
        let payload = parse_payload(Some(&json!({"date": "2025-08-04", "retries": 0}))).unwrap();
        let marked = mark_retried(&payload, "rerun_date_time_stamp", "20250804T101500");

        assert_eq!(marked["date"], "2025-08-04");
        assert_eq!(marked["retries"], 0);
        assert_eq!(marked["rerun_date_time_stamp"], "20250804T101500");
        assert!(!payload.contains_key("rerun_date_time_stamp"));
    }

    #[test]
    fn test_min_name_len_holds_timestamp_suffix() {
        let stamp = chrono::Utc::now().format(RETRY_TIMESTAMP_FORMAT).to_string();
        assert_eq!(MIN_EXECUTION_NAME_LEN, stamp.len() + 1);

        let name = retry_execution_name("nightly", &stamp, MIN_EXECUTION_NAME_LEN);
        assert_eq!(name, format!("_{}", stamp));
    }

    #[test]
    fn test_execution_name_fits_limit() {
        assert_eq!(
            retry_execution_name("nightly", "20250804T101500", 80),
            "nightly_20250804T101500"
        );

        let long = "a".repeat(100);
        let name = retry_execution_name(&long, "20250804T101500", 80);
        assert_eq!(name.chars().count(), 80);
        assert!(name.ends_with("_20250804T101500"));
    }
}
