use crate::utils::error::{ErrorCategory, ServiceError};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: String,
}

/// `Json` extractor whose rejections answer with an `ErrorBody`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub(super) struct ApiJson<T>(pub T);

/// `Path` extractor whose rejections answer with an `ErrorBody`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub(super) struct ApiPath<T>(pub T);

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::ValidationError {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::ValidationError {
            message: rejection.body_text(),
        }
    }
}

fn status_for(error: &ServiceError) -> StatusCode {
    match (error, error.category()) {
        (_, ErrorCategory::Input) => StatusCode::BAD_REQUEST,
        (ServiceError::DuplicateKey { .. }, _) => StatusCode::CONFLICT,
        _ if error.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        (_, ErrorCategory::Network) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(
                "Request failed: {} (Category: {:?}, Severity: {:?})",
                self,
                self.category(),
                self.severity()
            );
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            error: self.user_friendly_message(),
            category: format!("{:?}", self.category()).to_lowercase(),
        };
        (status, Json(body)).into_response()
    }
}
