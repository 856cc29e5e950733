use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid or expired token, or bad credentials.
    #[error("{0}")]
    Auth(String),
    /// Ownership mismatch or access to a private resource.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A unique account field is already taken.
    #[error("{0}")]
    Conflict(String),
    /// A movie is already part of a collection.
    #[error("{0}")]
    Duplicate(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("{0}")]
    Internal(String),
}

/// Logs `err` and turns it into an opaque internal error.
pub fn internal<E: std::fmt::Debug>(err: E, message: &'static str) -> Error {
    debug!("{:?}", err);
    Error::Internal(message.to_owned())
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Message shown to the client. Infrastructure failures never leak their
    /// details.
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal Server Error".to_owned()
        } else {
            self.to_string()
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Duplicate(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Storage(_)
            | Error::Encoding(_)
            | Error::Token(_)
            | Error::Hash(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("{} {}", status.as_u16(), self);
        }
        HttpResponse::build(status).json(json!({
            "success": false,
            "statusCode": status.as_u16(),
            "message": self.public_message(),
        }))
    }
}
