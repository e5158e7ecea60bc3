//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used by every HTTP handler.
//! It centralizes error management, providing a consistent way to represent the
//! failures a request can hit, from an unreachable store to validation failures.
//!
//! `AppError` implements `actix_web::error::ResponseError` to convert application
//! errors into HTTP responses with JSON bodies. `From` implementations for
//! `StoreError`, `OutboxError`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error`, `bcrypt::BcryptError` and `serde_json::Error`
//! allow conversion with the `?` operator.

use actix_web::{error::ResponseError, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

use crate::outbox::OutboxError;
use crate::store::StoreError;

/// Represents all possible errors that can occur while serving a request.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or is missing (HTTP 401).
    Unauthorized(String),
    /// Malformed or otherwise unacceptable request (HTTP 400).
    BadRequest(String),
    /// The requested resource does not exist (HTTP 404).
    NotFound(String),
    /// The request conflicts with existing data, e.g. a duplicate email (HTTP 409).
    Conflict(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// The key-value store could not be reached (HTTP 503).
    ServiceUnavailable(String),
    /// Input failed validation (HTTP 422 Unprocessable Entity).
    /// Wraps errors from the `validator` crate.
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthorized(msg) => HttpResponse::Unauthorized().json(json!({
                "error": msg
            })),
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(json!({
                "error": msg
            })),
            AppError::NotFound(msg) => HttpResponse::NotFound().json(json!({
                "error": msg
            })),
            AppError::Conflict(msg) => HttpResponse::Conflict().json(json!({
                "error": msg
            })),
            AppError::InternalServerError(msg) => HttpResponse::InternalServerError().json(json!({
                "error": msg
            })),
            AppError::ServiceUnavailable(msg) => HttpResponse::ServiceUnavailable().json(json!({
                "error": "Service temporarily unavailable",
                "message": msg
            })),
            AppError::ValidationError(msg) => HttpResponse::UnprocessableEntity().json(json!({
                "error": msg
            })),
        }
    }
}

/// Connectivity failures become 503 so clients can retry; anything else is a 500.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            StoreError::Command(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<OutboxError> for AppError {
    fn from(error: OutboxError) -> AppError {
        match error {
            OutboxError::Store(err) | OutboxError::QueueWrite(err) => err.into(),
            OutboxError::Invalid(msg) => AppError::ValidationError(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// A stored record that no longer parses is a server-side fault.
impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> AppError {
        AppError::InternalServerError(format!("Corrupt record: {}", error))
    }
}
