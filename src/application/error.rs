use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{likes::LikeError, repos::RepoError},
    domain::error::DomainError,
    infra::{error::InfraError, media::MediaStorageError},
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Failures of user-initiated actions on posts, comments and profiles.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("sign in required")]
    LoginRequired,
    #[error("not permitted: {0}")]
    Forbidden(&'static str),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error(transparent)]
    Media(#[from] MediaStorageError),
    #[error(transparent)]
    Repo(RepoError),
}

impl ActionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

impl From<RepoError> for ActionError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::Duplicate { constraint } => ActionError::Conflict(constraint),
            RepoError::NotFound => ActionError::not_found("record"),
            RepoError::InvalidInput { message } => ActionError::Validation(message),
            other => ActionError::Repo(other),
        }
    }
}

impl From<LikeError> for ActionError {
    fn from(error: LikeError) -> Self {
        match error {
            LikeError::LoginRequired => ActionError::LoginRequired,
            LikeError::NotFound { target } => ActionError::not_found(target.kind()),
            LikeError::Repo(source) | LikeError::WriteFailed { source, .. } => source.into(),
            other @ LikeError::InFlight { .. } => ActionError::Conflict(other.to_string()),
        }
    }
}

impl From<ActionError> for HttpError {
    fn from(error: ActionError) -> Self {
        const SOURCE: &str = "application::error::ActionError";
        let (status, public_message) = match &error {
            ActionError::LoginRequired => (StatusCode::UNAUTHORIZED, "Sign in required"),
            ActionError::Forbidden(_) => (StatusCode::FORBIDDEN, "Not permitted"),
            ActionError::NotFound { .. } => (StatusCode::NOT_FOUND, "Resource not found"),
            ActionError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "Request could not be processed")
            }
            ActionError::Conflict(_) => (StatusCode::CONFLICT, "Conflicting record"),
            ActionError::Media(MediaStorageError::UnsupportedType { .. })
            | ActionError::Media(MediaStorageError::EmptyPayload) => {
                (StatusCode::BAD_REQUEST, "Unsupported upload")
            }
            ActionError::Media(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Upload failed"),
            ActionError::Repo(RepoError::Timeout) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Storage timeout")
            }
            ActionError::Repo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Persistence error"),
        };
        HttpError::from_error(SOURCE, status, public_message, &error)
    }
}

impl From<LikeError> for HttpError {
    fn from(error: LikeError) -> Self {
        const SOURCE: &str = "application::error::LikeError";
        let (status, public_message) = match &error {
            LikeError::LoginRequired => (StatusCode::UNAUTHORIZED, "Sign in required"),
            LikeError::NotFound { .. } => (StatusCode::NOT_FOUND, "Resource not found"),
            LikeError::InFlight { .. } => (StatusCode::CONFLICT, "Like update in progress"),
            LikeError::WriteFailed { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "Like could not be saved")
            }
            LikeError::Repo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Persistence error"),
        };
        HttpError::from_error(SOURCE, status, public_message, &error)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
