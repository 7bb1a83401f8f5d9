use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use procureflow_auth::AuthzError;
use procureflow_core::DomainError;
use procureflow_infra::command_dispatcher::DispatchError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned by handlers; rendered as `{"error": code, "message": text}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_id", message)
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        json_error(self.status, self.code, self.message)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Concurrency(msg) => ApiError::conflict(msg),
            DispatchError::Conflict(msg) => ApiError::conflict(msg),
            DispatchError::Validation(msg) => ApiError::validation(msg),
            DispatchError::InvalidId(msg) => ApiError::invalid_id(msg),
            DispatchError::InvariantViolation(msg) => ApiError::invariant(msg),
            DispatchError::Unauthorized(msg) => ApiError::new(StatusCode::FORBIDDEN, "forbidden", msg),
            DispatchError::NotFound => ApiError::not_found("document"),
            DispatchError::Store(e) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
            }
            other @ (DispatchError::Deserialize(_) | DispatchError::Publish(_)) => {
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        DispatchError::from(err).into()
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/// Payload of an endpoint whose JSON body may be omitted. A request without a
/// JSON content type gets the default; a malformed body is still rejected.
pub fn optional_body<T: Default>(body: Result<axum::Json<T>, JsonRejection>) -> ApiResult<T> {
    match body {
        Ok(axum::Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body identifier, mapping failures to `invalid_id`.
pub fn parse_id<T>(raw: &str, field: &str) -> ApiResult<T>
where
    T: core::str::FromStr,
{
    raw.trim()
        .parse()
        .map_err(|_| ApiError::invalid_id(format!("invalid {field}: '{raw}'")))
}
