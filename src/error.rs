use std::error::Error;

use diesel::r2d2::PoolError;
use diesel::result::Error as DbError;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use crate::auth::TokenError;
use crate::voting::MIN_OPTIONS;

/// Every failure a request can end in. The variant picks the status code,
/// the message is what the client sees.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(Box<dyn Error + Send + Sync>),
}

#[derive(Serialize)]
pub struct Message<'a> {
    pub msg: &'a str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON reply without consuming the error, so rejections
    /// found by reference during recovery can be rendered too.
    pub fn to_response(&self) -> Response {
        let message = match self {
            ApiError::Internal(source) => {
                error!(error = %source, "request failed");
                "Internal server error".to_string()
            },
            other => other.to_string(),
        };
        reply::with_status(reply::json(&Message { msg: &message }), self.status()).into_response()
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

impl warp::reject::Reject for ApiError {}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        ApiError::Internal(Box::new(value))
    }
}

impl From<PoolError> for ApiError {
    fn from(value: PoolError) -> Self {
        ApiError::Internal(Box::new(value))
    }
}

impl From<JoinError> for ApiError {
    fn from(value: JoinError) -> Self {
        ApiError::Internal(Box::new(value))
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(value: bcrypt::BcryptError) -> Self {
        ApiError::Internal(Box::new(value))
    }
}

impl From<TokenError> for ApiError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Expired => expired_token(),
            TokenError::ExpiryOutOfRange => ApiError::Internal(Box::new(value)),
            TokenError::Malformed | TokenError::BadSignature => invalid_token(),
        }
    }
}

pub fn missing_fields() -> ApiError {
    ApiError::Validation(String::from("Missing required fields"))
}

pub fn missing_poll_fields() -> ApiError {
    ApiError::Validation(String::from("Missing required fields: question and options."))
}

pub fn missing_option_id() -> ApiError {
    ApiError::Validation(String::from("Missing required fields: optionId"))
}

pub fn blank_option(index: usize) -> ApiError {
    ApiError::Validation(format!("poll option {index} must not be empty"))
}

pub fn too_few_options(count: usize) -> ApiError {
    ApiError::Validation(format!("poll must have at least {MIN_OPTIONS} options, got {count}"))
}

pub fn invalid_body(reason: &str) -> ApiError {
    ApiError::Validation(format!("Invalid request body: {reason}"))
}

pub fn email_in_use() -> ApiError {
    ApiError::Conflict(String::from("Email already in use"))
}

pub fn username_in_use() -> ApiError {
    ApiError::Conflict(String::from("Username already in use"))
}

pub fn invalid_email() -> ApiError {
    ApiError::Auth(String::from("Invalid email"))
}

pub fn invalid_password() -> ApiError {
    ApiError::Auth(String::from("Invalid password"))
}

pub fn missing_token() -> ApiError {
    ApiError::Auth(String::from("Missing Authorization Header"))
}

pub fn invalid_token() -> ApiError {
    ApiError::Auth(String::from("Invalid token"))
}

pub fn expired_token() -> ApiError {
    ApiError::Auth(String::from("Token has expired"))
}

pub fn unknown_identity() -> ApiError {
    ApiError::Auth(String::from("User not found"))
}

pub fn not_authorized_to_create() -> ApiError {
    ApiError::Forbidden(String::from("You are not authorized to create polls"))
}

pub fn unauthorized() -> ApiError {
    ApiError::Forbidden(String::from("Unauthorized"))
}

pub fn poll_not_found() -> ApiError {
    ApiError::NotFound(String::from("Poll not found"))
}

pub fn option_not_found() -> ApiError {
    ApiError::NotFound(String::from("Option not found for this poll"))
}

pub fn route_not_found() -> ApiError {
    ApiError::NotFound(String::from("Not found"))
}

pub fn already_voted() -> ApiError {
    ApiError::Conflict(String::from("User has already voted on this poll"))
}

pub fn poll_has_votes() -> ApiError {
    ApiError::Conflict(String::from("Cannot edit poll after votes have been cast"))
}
