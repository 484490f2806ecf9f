//! Error types produced while building and while serving.
//!
//! [`DispatchError`] is the runtime taxonomy: every variant maps to exactly one status
//! code and renders as a `{"message", "statusCode", "error"}` JSON body at the outermost
//! dispatch boundary. Errors raised inside pipes, handlers or interceptors travel up the
//! interceptor chain unchanged unless an interceptor converts them.

use http::{Method, StatusCode};
use serde_json::{Value, json};
use std::error::Error;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Cannot {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("{message}")]
    ParamValidation { param: String, message: String },

    #[error("Precondition failed")]
    PreconditionFailed,

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("handler error: {source}")]
    Handler {
        #[from]
        source: BoxError,
    },

    #[error("execution context is not available outside of a dispatch scope")]
    ContextUnavailable,
}

impl DispatchError {
    pub fn route_not_found(method: &Method, path: impl Into<String>) -> Self {
        Self::RouteNotFound { method: method.clone(), path: path.into() }
    }

    pub fn param_validation<P: ToString, M: ToString>(param: P, message: M) -> Self {
        Self::ParamValidation { param: param.to_string(), message: message.to_string() }
    }

    pub fn http<M: ToString>(status: StatusCode, message: M) -> Self {
        Self::Http { status, message: message.to_string() }
    }

    pub fn bad_request<M: ToString>(message: M) -> Self {
        Self::http(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<M: ToString>(message: M) -> Self {
        Self::http(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden<M: ToString>(message: M) -> Self {
        Self::http(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict<M: ToString>(message: M) -> Self {
        Self::http(StatusCode::CONFLICT, message)
    }

    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    /// The status code this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ParamValidation { .. } => StatusCode::BAD_REQUEST,
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::Http { status, .. } => *status,
            Self::Handler { .. } | Self::ContextUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error is not part of the typed taxonomy and must be rendered
    /// without leaking its message.
    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    /// Short error name, e.g. `NotFound` or `PreconditionFailed`.
    pub fn name(&self) -> &'static str {
        status_name(self.status())
    }

    /// Renders the client facing body.
    pub fn to_body(&self) -> Value {
        let status = self.status();
        let message = if self.is_internal() { "Internal server error".to_string() } else { self.to_string() };
        json!({
            "message": message,
            "statusCode": status.as_u16(),
            "error": self.name(),
        })
    }
}

fn status_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BadRequest",
        StatusCode::UNAUTHORIZED => "Unauthorized",
        StatusCode::FORBIDDEN => "Forbidden",
        StatusCode::NOT_FOUND => "NotFound",
        StatusCode::METHOD_NOT_ALLOWED => "MethodNotAllowed",
        StatusCode::CONFLICT => "Conflict",
        StatusCode::PRECONDITION_FAILED => "PreconditionFailed",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UnsupportedMediaType",
        StatusCode::UNPROCESSABLE_ENTITY => "UnprocessableEntity",
        StatusCode::TOO_MANY_REQUESTS => "TooManyRequests",
        s if s.is_server_error() => "InternalServerError",
        _ => "HttpError",
    }
}

/// Errors raised while assembling a [`Router`](crate::Router).
#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RouterBuildError {
    pub fn invalid_pattern<P: ToString, R: ToString>(pattern: P, reason: R) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }
}

/// Errors raised while assembling a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatcherBuildError {
    #[error("router must be set")]
    MissingRouter,

    #[error(transparent)]
    Router(#[from] RouterBuildError),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}
