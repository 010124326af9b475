//! Request and response envelopes exchanged with the hub.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hub_policy::CallerContext;
use hub_primitives::{ErrorKind, RequestId};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Inbound request naming a tool or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    request_id: RequestId,
    operation: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    caller: CallerContext,
}

impl RequestEnvelope {
    /// Creates a request for `operation` (a tool or method name) with a fresh
    /// request id and an anonymous caller.
    #[must_use]
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: RequestId::random(),
            operation: operation.into(),
            payload,
            caller: CallerContext::anonymous(),
        }
    }

    /// Replaces the caller context.
    #[must_use]
    pub fn with_caller(mut self, caller: CallerContext) -> Self {
        self.caller = caller;
        self
    }

    /// Replaces the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the tool or method name.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the caller context.
    #[must_use]
    pub fn caller(&self) -> &CallerContext {
        &self.caller
    }
}

/// Terminal or interim status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Implementation returned a payload.
    Completed,
    /// Request failed; see the error.
    Failed,
    /// Accepted for detached execution; no outcome yet.
    Pending,
}

/// Machine-readable failure carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Failure kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    /// Creates an error description.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Timing and routing details attached to every response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseMetadata {
    /// Time spent from validation to the terminal state.
    #[serde(rename = "execution_time_ms", serialize_with = "as_millis")]
    pub execution_time: Duration,
    /// Method that served the request, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Tool the request was routed through, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// When the request reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Outbound response. A completed response carries a payload and no error, a
/// failed one the reverse, and a pending one neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    request_id: RequestId,
    status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorInfo>,
    metadata: ResponseMetadata,
}

impl ResponseEnvelope {
    /// Successful response.
    #[must_use]
    pub fn completed(request_id: RequestId, payload: Value, metadata: ResponseMetadata) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Completed,
            payload: Some(payload),
            error: None,
            metadata,
        }
    }

    /// Failed response.
    #[must_use]
    pub fn failed(request_id: RequestId, error: ErrorInfo, metadata: ResponseMetadata) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Failed,
            payload: None,
            error: Some(error),
            metadata,
        }
    }

    /// Receipt for a request accepted for detached execution.
    #[must_use]
    pub fn pending(request_id: RequestId, metadata: ResponseMetadata) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Pending,
            payload: None,
            error: None,
            metadata,
        }
    }

    /// Returns the echoed request id.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Returns the payload of a completed response.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Returns the error of a failed response.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Shorthand for the error kind of a failed response.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    /// Returns the metadata.
    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Returns `true` for completed responses.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ResponseStatus::Completed
    }

    /// Returns `true` for failed responses.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == ResponseStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_fill_in_on_deserialize() {
        let request: RequestEnvelope =
            serde_json::from_value(json!({ "operation": "create_casefile" })).unwrap();
        assert_eq!(request.operation(), "create_casefile");
        assert_eq!(request.payload(), &Value::Null);
        assert!(!request.caller().is_authenticated());
    }

    #[test]
    fn failed_response_serializes_error_without_payload() {
        let metadata = ResponseMetadata {
            execution_time: Duration::from_millis(12),
            method: Some("workspace.casefile.create_casefile".into()),
            ..ResponseMetadata::default()
        };
        let response = ResponseEnvelope::failed(
            RequestId::random(),
            ErrorInfo::new(ErrorKind::Validation, "title: missing required field"),
            metadata,
        );
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["status"], "failed");
        assert_eq!(encoded["error"]["kind"], "ValidationError");
        assert!(encoded.get("payload").is_none());
        assert_eq!(encoded["metadata"]["execution_time_ms"], 12);
        assert!(encoded["metadata"].get("tool").is_none());
    }

    #[test]
    fn pending_carries_neither_payload_nor_error() {
        let response = ResponseEnvelope::pending(RequestId::random(), ResponseMetadata::default());
        assert_eq!(response.status(), ResponseStatus::Pending);
        assert!(response.payload().is_none());
        assert!(response.error().is_none());
    }
}
