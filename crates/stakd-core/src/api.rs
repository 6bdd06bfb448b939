//! Wire envelopes shared by every REST call.
//!
//! Every transport call resolves to an [`ApiResponse`], the discriminated
//! result `{success: true, data}` / `{success: false, error}`. Network and
//! HTTP failures are normalized into the same [`ApiError`] shape so callers
//! only ever branch on one thing.

use serde::de::{DeserializeOwned, Error as _};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Application or transport error in the normalized wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Machine-readable error code (server supplied or one of the constants).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// HTTP status the error arrived with, if any.
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ApiError {
    /// The request never produced an HTTP response.
    pub const NETWORK_ERROR: &'static str = "NETWORK_ERROR";
    /// A 2xx response body could not be decoded.
    pub const DECODE_ERROR: &'static str = "DECODE_ERROR";
    /// Fallback when nothing better is known.
    pub const UNKNOWN_ERROR: &'static str = "UNKNOWN_ERROR";

    /// Creates an error with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            status: None,
        }
    }

    /// Creates a network failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Self::NETWORK_ERROR, message)
    }

    /// Creates a decode failure.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(Self::DECODE_ERROR, message)
    }

    /// Creates an error for a non-2xx response without an error envelope.
    pub fn http_status(status: u16, reason: Option<&str>) -> Self {
        let message = reason.unwrap_or("Request failed").to_string();
        Self::new(format!("HTTP_{status}"), message).with_status(status)
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` for failures that may go away on a later attempt.
    pub fn is_retryable(&self) -> bool {
        if self.code == Self::NETWORK_ERROR {
            return true;
        }
        matches!(self.status, Some(s) if s >= 500 || s == 429)
    }

    /// Returns `true` if the server rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// Discriminated result of a REST call.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse<T> {
    /// `{success: true, data}`
    Success(T),
    /// `{success: false, error}`
    Failure(ApiError),
}

impl<T> ApiResponse<T> {
    /// Returns `true` for [`ApiResponse::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the data, discarding any error.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// Returns the error, if any.
    pub fn err(&self) -> Option<&ApiError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(err) => Err(err),
        }
    }

    /// Maps the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ApiResponse<U> {
        match self {
            Self::Success(data) => ApiResponse::Success(f(data)),
            Self::Failure(err) => ApiResponse::Failure(err),
        }
    }
}

impl<T> From<Result<T, ApiError>> for ApiResponse<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure(err),
        }
    }
}

impl<T: Serialize> Serialize for ApiResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiResponse", 2)?;
        match self {
            Self::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure(err) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", err)?;
            }
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ApiError>,
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ApiResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::deserialize(deserializer)?;
        if raw.success {
            let data = T::deserialize(raw.data.unwrap_or(Value::Null)).map_err(D::Error::custom)?;
            Ok(Self::Success(data))
        } else {
            raw.error
                .map(Self::Failure)
                .ok_or_else(|| D::Error::missing_field("error"))
        }
    }
}

/// Returns `true` if a JSON value looks like an `{success, ...}` envelope.
pub fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.get("success").is_some_and(Value::is_boolean))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_wire_shape() {
        let resp = ApiResponse::Success(json!({"id": "c1"}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"id": "c1"}}));
    }

    #[test]
    fn test_failure_wire_shape() {
        let resp: ApiResponse<()> = ApiResponse::Failure(ApiError::new("NOT_FOUND", "Contact not found"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": {"code": "NOT_FOUND", "message": "Contact not found"}})
        );
    }

    #[test]
    fn test_parse_failure_envelope() {
        let resp: ApiResponse<Value> = serde_json::from_value(json!({
            "success": false,
            "error": {"code": "FORBIDDEN", "message": "nope", "details": {"field": "orgId"}}
        }))
        .unwrap();
        let err = resp.err().unwrap();
        assert_eq!(err.code, "FORBIDDEN");
        assert_eq!(err.details, Some(json!({"field": "orgId"})));
    }

    #[test]
    fn test_parse_unit_success_without_data() {
        let resp: ApiResponse<()> = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(resp.is_success());
    }

    #[test]
    fn test_failure_without_error_is_rejected() {
        let resp = serde_json::from_value::<ApiResponse<Value>>(json!({"success": false}));
        assert!(resp.is_err());
    }

    #[test]
    fn test_http_status_error() {
        let err = ApiError::http_status(503, Some("Service Unavailable"));
        assert_eq!(err.code, "HTTP_503");
        assert_eq!(err.status, Some(503));
        assert!(err.is_retryable());
        assert!(!ApiError::http_status(404, None).is_retryable());
        assert!(ApiError::http_status(401, None).is_unauthorized());
    }

    #[test]
    fn test_is_envelope() {
        assert!(is_envelope(&json!({"success": true, "data": []})));
        assert!(!is_envelope(&json!({"data": [], "total": 0})));
        assert!(!is_envelope(&json!([1, 2, 3])));
    }

    #[test]
    fn test_into_result_and_map() {
        let resp: ApiResponse<u32> = ApiResponse::Success(2);
        assert_eq!(resp.map(|n| n * 2).into_result(), Ok(4));
        let resp: ApiResponse<u32> = Err(ApiError::network("down")).into();
        assert_eq!(resp.clone().ok(), None);
        assert_eq!(resp.into_result().unwrap_err().code, ApiError::NETWORK_ERROR);
    }
}
