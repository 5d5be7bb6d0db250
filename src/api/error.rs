//! Structured API error responses with error codes
//!
//! Every failure leaves the API as `{"error": {code, numeric_code, message}}`
//! with a status derived from the pipeline's error kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::{ErrorKind, ProvenanceError};
use crate::ledger::{LedgerError, LedgerWriteError};

/// Stable error codes for API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization (1xxx)
    NotAuthorized,
    IdentityRequired,
    IdentityChanged,

    // Validation (3xxx)
    InvalidRequestBody,
    CanonicalizationFailed,

    // Resources (4xxx)
    RecordNotFound,
    RecordNotStored,

    // Conflicts (5xxx)
    DuplicateRecord,

    // Content integrity (6xxx)
    EncryptionError,
    DecryptionFailed,
    UnwrapFailed,
    TamperDetected,

    // Flow state (7xxx)
    InvalidStateTransition,

    // Infrastructure (8xxx)
    StoreUnavailable,
    LedgerWriteFailed,
    LedgerReadFailed,
    NotConfigured,
    InternalError,
}

impl ErrorCode {
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::NotAuthorized => 1001,
            ErrorCode::IdentityRequired => 1002,
            ErrorCode::IdentityChanged => 1003,

            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::CanonicalizationFailed => 3002,

            ErrorCode::RecordNotFound => 4001,
            ErrorCode::RecordNotStored => 4002,

            ErrorCode::DuplicateRecord => 5001,

            ErrorCode::EncryptionError => 6001,
            ErrorCode::DecryptionFailed => 6002,
            ErrorCode::UnwrapFailed => 6003,
            ErrorCode::TamperDetected => 6004,

            ErrorCode::InvalidStateTransition => 7001,

            ErrorCode::StoreUnavailable => 8001,
            ErrorCode::LedgerWriteFailed => 8002,
            ErrorCode::LedgerReadFailed => 8003,
            ErrorCode::NotConfigured => 8004,
            ErrorCode::InternalError => 8999,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::NotAuthorized | ErrorCode::IdentityRequired => StatusCode::FORBIDDEN,
            ErrorCode::IdentityChanged => StatusCode::CONFLICT,

            ErrorCode::InvalidRequestBody | ErrorCode::CanonicalizationFailed => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::RecordNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RecordNotStored => StatusCode::NOT_FOUND,

            ErrorCode::DuplicateRecord => StatusCode::CONFLICT,

            ErrorCode::DecryptionFailed | ErrorCode::UnwrapFailed | ErrorCode::TamperDetected => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            ErrorCode::StoreUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::EncryptionError
            | ErrorCode::InvalidStateTransition
            | ErrorCode::LedgerWriteFailed
            | ErrorCode::LedgerReadFailed
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotAuthorized => "NOT_AUTHORIZED",
            ErrorCode::IdentityRequired => "IDENTITY_REQUIRED",
            ErrorCode::IdentityChanged => "IDENTITY_CHANGED",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::CanonicalizationFailed => "CANONICALIZATION_FAILED",
            ErrorCode::RecordNotFound => "RECORD_NOT_FOUND",
            ErrorCode::RecordNotStored => "RECORD_NOT_STORED",
            ErrorCode::DuplicateRecord => "DUPLICATE_RECORD",
            ErrorCode::EncryptionError => "ENCRYPTION_ERROR",
            ErrorCode::DecryptionFailed => "DECRYPTION_FAILED",
            ErrorCode::UnwrapFailed => "UNWRAP_FAILED",
            ErrorCode::TamperDetected => "TAMPER_DETECTED",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorCode::LedgerWriteFailed => "LEDGER_WRITE_FAILED",
            ErrorCode::LedgerReadFailed => "LEDGER_READ_FAILED",
            ErrorCode::NotConfigured => "NOT_CONFIGURED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub message: String,

    /// Related record id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                resource_id: None,
                details: None,
            },
        }
    }

    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequestBody, message)
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error.code.as_str();
        let mut response = (status, Json(self)).into_response();

        response.headers_mut().insert(
            axum::http::header::HeaderName::from_static("x-error-code"),
            axum::http::HeaderValue::from_static(code),
        );

        response
    }
}

impl From<ProvenanceError> for ApiError {
    fn from(err: ProvenanceError) -> Self {
        let message = err.to_string();

        let code = match &err {
            ProvenanceError::Ledger(LedgerError::Write(LedgerWriteError::Duplicate(_))) => {
                ErrorCode::DuplicateRecord
            }
            ProvenanceError::MissingIdentity => ErrorCode::IdentityRequired,
            _ => match err.kind() {
                ErrorKind::Canonicalization => ErrorCode::CanonicalizationFailed,
                ErrorKind::InvalidRequest => ErrorCode::InvalidRequestBody,
                ErrorKind::Encryption => ErrorCode::EncryptionError,
                ErrorKind::Decryption => ErrorCode::DecryptionFailed,
                ErrorKind::StoreUnavailable => ErrorCode::StoreUnavailable,
                ErrorKind::Unwrap => ErrorCode::UnwrapFailed,
                ErrorKind::LedgerWrite => ErrorCode::LedgerWriteFailed,
                ErrorKind::LedgerRead => ErrorCode::LedgerReadFailed,
                ErrorKind::NotConfigured => ErrorCode::NotConfigured,
                ErrorKind::NotAuthorized => ErrorCode::NotAuthorized,
                ErrorKind::RecordNotFound => ErrorCode::RecordNotFound,
                ErrorKind::NotStored => ErrorCode::RecordNotStored,
                ErrorKind::Tamper => ErrorCode::TamperDetected,
                ErrorKind::IdentityChanged => ErrorCode::IdentityChanged,
                ErrorKind::InvalidTransition => ErrorCode::InvalidStateTransition,
                ErrorKind::Notification | ErrorKind::Configuration => ErrorCode::InternalError,
            },
        };

        let resource_id = match &err {
            ProvenanceError::NotAuthorized { record_id, .. }
            | ProvenanceError::RecordNotFound(record_id)
            | ProvenanceError::NotStored(record_id)
            | ProvenanceError::Ledger(LedgerError::Write(LedgerWriteError::Duplicate(record_id))) => {
                Some(record_id.to_string())
            }
            ProvenanceError::TamperDetected { warning, .. } => Some(warning.record_id.to_string()),
            _ => None,
        };

        let mut api_error = ApiError::new(code, message);
        if let Some(warning) = err.tamper_warning() {
            api_error = api_error.with_details(serde_json::json!({
                "expectedDigest": warning.expected,
                "actualDigest": warning.actual,
            }));
        }
        if let Some(id) = resource_id {
            api_error = api_error.with_resource_id(id);
        }
        api_error
    }
}
