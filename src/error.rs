use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// A single field that failed validation while decoding a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Canonical field name (e.g. `call_sid`).
    pub field: String,
    /// What went wrong with it.
    pub reason: FieldErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// Required field absent or empty.
    Missing,
    /// Value present but not parseable as the declared type.
    InvalidType,
    /// Value outside the permitted enumerated set (strict mode only).
    InvalidValue,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self.reason {
            FieldErrorKind::Missing => "missing",
            FieldErrorKind::InvalidType => "invalid type",
            FieldErrorKind::InvalidValue => "invalid value",
        };
        write!(f, "{}: {}", self.field, reason)
    }
}

/// The main error type for ringback.
///
/// Webhook-facing variants carry the exact response contract Twilio expects:
/// a rejected signature answers with an empty body, and decode failures are
/// contract errors on the integrating application's side, not security events.
#[derive(Debug, thiserror::Error)]
pub enum RingbackError {
    /// The request's `X-Twilio-Signature` header was absent, malformed, or
    /// did not match the computed signature.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// The callback parameters did not decode into the expected request
    /// shape. Every offending field is listed, not just the first.
    #[error("callback validation failed: {}", format_fields(.0))]
    DecodeValidation(Vec<FieldError>),

    /// The handler returned a document that could not be serialized to TwiML.
    #[error("handler did not return a valid TwiML response: {0}")]
    InvalidHandlerReturn(String),

    /// Credentials were absent at initialization; the integration is running
    /// disabled and the attempted operation requires them.
    #[error("Twilio credentials not configured: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Twilio API error: {0}")]
    Api(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RingbackError {
    pub fn decode_validation(fields: Vec<FieldError>) -> Self {
        Self::DecodeValidation(fields)
    }

    pub fn invalid_handler_return(msg: impl Into<String>) -> Self {
        Self::InvalidHandlerReturn(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::SignatureInvalid => StatusCode::FORBIDDEN,
            Self::DecodeValidation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidHandlerReturn(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RingbackError {
    /// Twilio only needs the status code, so error responses carry no body.
    /// Full failure detail is logged server-side; nothing about the failure
    /// is exposed to the caller.
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            RingbackError::SignatureInvalid => {
                tracing::warn!(status = status.as_u16(), "rejected webhook: invalid signature");
            }
            RingbackError::DecodeValidation(fields) => {
                tracing::error!(
                    status = status.as_u16(),
                    fields = %format_fields(fields),
                    "webhook callback failed validation"
                );
            }
            other => {
                tracing::error!(status = status.as_u16(), error = %other, "webhook request failed");
            }
        }

        (
            status,
            [(header::CONTENT_TYPE, crate::response::APPLICATION_XML)],
        )
            .into_response()
    }
}

impl From<reqwest::Error> for RingbackError {
    fn from(err: reqwest::Error) -> Self {
        RingbackError::Api(err.to_string())
    }
}

/// Result type alias for ringback operations.
pub type Result<T> = std::result::Result<T, RingbackError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, reason: FieldErrorKind) -> FieldError {
        FieldError {
            field: name.to_string(),
            reason,
        }
    }

    #[test]
    fn test_signature_invalid_display() {
        let err = RingbackError::SignatureInvalid;
        assert_eq!(err.to_string(), "invalid webhook signature");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_decode_validation_lists_every_field() {
        let err = RingbackError::decode_validation(vec![
            field("call_sid", FieldErrorKind::Missing),
            field("recording_duration", FieldErrorKind::InvalidType),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("call_sid: missing"));
        assert!(msg.contains("recording_duration: invalid type"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_handler_return() {
        let err = RingbackError::invalid_handler_return("serialization failed");
        assert!(matches!(err, RingbackError::InvalidHandlerReturn(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_configuration_missing() {
        let err = RingbackError::ConfigurationMissing("auth token");
        assert!(err.to_string().contains("auth token"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_signature_invalid_response_has_empty_body() {
        let response = RingbackError::SignatureInvalid.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_decode_validation_response_has_empty_body() {
        let err = RingbackError::decode_validation(vec![field("call_sid", FieldErrorKind::Missing)]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }
}
