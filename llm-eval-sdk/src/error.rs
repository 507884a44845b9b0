//! SDK error types and handling
//!
//! Every failed call surfaces as an [`SdkError`]. Nothing is retried; the
//! caller decides whether to re-trigger the operation.

use llm_eval_core::CoreError;
use thiserror::Error;

/// The main error type for the SDK
#[derive(Error, Debug)]
pub enum SdkError {
    /// API returned an error response
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
        error_code: Option<String>,
        request_id: Option<String>,
    },

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Request timed out (only when a timeout was configured)
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The backend rejected the credentials. No re-authentication is
    /// attempted.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No session is available to authenticate the call
    #[error("Not signed in: {0}")]
    NotAuthenticated(String),

    /// Authorization failed
    #[error("Access denied: {0}")]
    AuthorizationError(String),

    /// Resource not found
    #[error("Resource not found: {resource_type} with ID {resource_id}")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Conflict error (e.g., duplicate resource)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

/// Error body returned by the backend functions. Both fields are optional
/// because different functions fill in different ones.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ApiErrorResponse {
    fn text(&self) -> Option<String> {
        self.message.clone().or_else(|| self.error.clone())
    }
}

impl SdkError {
    /// Create an API error from a non-2xx response
    pub fn from_response(status: u16, body: &str, request_id: Option<String>) -> Self {
        let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(ApiErrorResponse::text)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                }
            });

        match status {
            401 => SdkError::Unauthorized(message),
            403 => SdkError::AuthorizationError(message),
            404 => SdkError::NotFound {
                resource_type: "resource".to_string(),
                resource_id: message,
            },
            409 => SdkError::Conflict(message),
            400 | 422 => SdkError::ValidationError(message),
            500..=599 => SdkError::ServerError(message),
            _ => SdkError::ApiError {
                status,
                message,
                error_code: parsed.and_then(|p| p.code.or(p.error)),
                request_id,
            },
        }
    }

    /// Narrows a generic 404 to the resource that was asked for.
    pub fn with_resource(self, resource_type: &str, resource_id: impl ToString) -> Self {
        match self {
            SdkError::NotFound { .. } => SdkError::NotFound {
                resource_type: resource_type.to_string(),
                resource_id: resource_id.to_string(),
            },
            other => other,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SdkError::ApiError { status, .. } => Some(*status),
            SdkError::Unauthorized(_) => Some(401),
            SdkError::AuthorizationError(_) => Some(403),
            SdkError::NotFound { .. } => Some(404),
            SdkError::Conflict(_) => Some(409),
            SdkError::ValidationError(_) => Some(422),
            SdkError::ServerError(_) => Some(500),
            _ => None,
        }
    }

    /// Get the request ID if available
    pub fn request_id(&self) -> Option<&str> {
        match self {
            SdkError::ApiError { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// True for errors that mean the session is missing or rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SdkError::Unauthorized(_) | SdkError::NotAuthenticated(_)
        )
    }
}

impl From<validator::ValidationErrors> for SdkError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SdkError::ValidationError(errors.to_string())
    }
}

impl From<CoreError> for SdkError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) | CoreError::InvalidState(msg) | CoreError::Busy(msg) => {
                SdkError::ValidationError(msg)
            }
            CoreError::NotFound(id) => SdkError::NotFound {
                resource_type: "resource".to_string(),
                resource_id: id,
            },
            CoreError::Unauthorized(msg) => SdkError::Unauthorized(msg),
            CoreError::Backend(msg) => SdkError::ServerError(msg),
            CoreError::Serialization(msg) => SdkError::ValidationError(msg),
        }
    }
}

impl From<SdkError> for CoreError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::Unauthorized(msg) | SdkError::NotAuthenticated(msg) => {
                CoreError::Unauthorized(msg)
            }
            SdkError::NotFound {
                resource_type,
                resource_id,
            } => CoreError::NotFound(format!("{} {}", resource_type, resource_id)),
            SdkError::ValidationError(msg) => CoreError::Validation(msg),
            SdkError::SerializationError(e) => CoreError::Serialization(e.to_string()),
            other => CoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_json_response() {
        let body = r#"{"error": "not_found", "message": "Experiment not found"}"#;
        let error = SdkError::from_response(404, body, Some("req-123".to_string()));

        assert!(matches!(error, SdkError::NotFound { .. }));
    }

    #[test]
    fn test_unauthorized_is_generic() {
        let error = SdkError::from_response(401, "", None);
        assert!(matches!(error, SdkError::Unauthorized(_)));
        assert!(error.is_auth_error());
        assert_eq!(CoreError::from(error), CoreError::Unauthorized("HTTP 401".to_string()));
    }

    #[test]
    fn test_error_message_fallbacks() {
        let error = SdkError::from_response(418, r#"{"error": "teapot"}"#, Some("r1".to_string()));
        match error {
            SdkError::ApiError {
                status,
                message,
                error_code,
                request_id,
            } => {
                assert_eq!(status, 418);
                assert_eq!(message, "teapot");
                assert_eq!(error_code.as_deref(), Some("teapot"));
                assert_eq!(request_id.as_deref(), Some("r1"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let plain = SdkError::from_response(502, "bad gateway", None);
        assert_eq!(plain.to_string(), "Server error: bad gateway");
    }

    #[test]
    fn test_error_status_code() {
        let api_error = SdkError::ApiError {
            status: 400,
            message: "Bad request".to_string(),
            error_code: None,
            request_id: None,
        };
        assert_eq!(api_error.status_code(), Some(400));

        let auth_error = SdkError::Unauthorized("Invalid token".to_string());
        assert_eq!(auth_error.status_code(), Some(401));
    }

    #[test]
    fn test_not_found_narrowing() {
        let error = SdkError::from_response(404, "", None).with_resource("dataset", "abc");
        assert_eq!(error.to_string(), "Resource not found: dataset with ID abc");
    }
}
