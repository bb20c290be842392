use crate::db::errors::DbError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Base URI for the `type` member of problem detail responses
pub const PROBLEM_TYPE_BASE: &str = "https://api.gadgetry.com/errors/";

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Requested resource not found
    #[error("{resource} not found with id: {id}")]
    NotFound { resource: String, id: String },

    /// Request conflicts with the current state of the resource
    #[error("{message}")]
    Conflict { message: String },

    /// Request body failed field validation
    #[error("Validation failed")]
    Validation { errors: BTreeMap<String, String> },

    /// Invalid request data: malformed JSON, bad path or query parameters
    #[error("{message}")]
    BadRequest { message: String },

    /// Well-formed request that cannot be applied in the resource's current state
    #[error("{message}")]
    Unprocessable { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// RFC 7807 problem detail body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetail {
    /// URI identifying the problem type
    #[serde(rename = "type")]
    #[schema(example = "https://api.gadgetry.com/errors/device-not-found")]
    pub problem_type: String,
    #[schema(example = "Device Not Found")]
    pub title: String,
    #[schema(example = 404)]
    pub status: u16,
    #[schema(example = "Device not found with id: 123e4567-e89b-12d3-a456-426614174000")]
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Field name to message, present for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

/// "Device" -> "device", "Device Group" -> "device-group"
fn slug(resource: &str) -> String {
    resource.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join("-")
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Validation { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } | DbError::StaleVersion { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Error::NotFound { resource, .. } => format!("{resource} Not Found"),
            _ => self.status_code().canonical_reason().unwrap_or("Error").to_string(),
        }
    }

    /// Full problem type URI
    pub fn problem_type(&self) -> String {
        let suffix = match self {
            Error::NotFound { resource, .. } => format!("{}-not-found", slug(resource)),
            Error::Validation { .. } => "validation".to_string(),
            _ => match self.status_code() {
                StatusCode::NOT_FOUND => "not-found",
                StatusCode::CONFLICT => "conflict",
                StatusCode::BAD_REQUEST => "bad-request",
                StatusCode::UNPROCESSABLE_ENTITY => "unprocessable-entity",
                _ => "internal-server-error",
            }
            .to_string(),
        };
        format!("{PROBLEM_TYPE_BASE}{suffix}")
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound { .. } | Error::Conflict { .. } | Error::BadRequest { .. } | Error::Unprocessable { .. } => {
                self.to_string()
            }
            Error::Validation { .. } => "Validation failed".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::StaleVersion { entity_type, .. } => {
                    format!("{entity_type} was modified concurrently, please retry")
                }
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "An unexpected error occurred".to_string(),
            },
            Error::Other(_) => "An unexpected error occurred".to_string(),
        }
    }

    pub fn to_problem_detail(&self) -> ProblemDetail {
        ProblemDetail {
            problem_type: self.problem_type(),
            title: self.title(),
            status: self.status_code().as_u16(),
            detail: self.user_message(),
            instance: None,
            errors: match self {
                Error::Validation { errors } => Some(errors.clone()),
                _ => None,
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::NotFound { .. } | Error::Validation { .. } | Error::BadRequest { .. } | Error::Unprocessable { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let problem = self.to_problem_detail();
        (self.status_code(), [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)], Json(problem)).into_response()
    }
}

/// Validation errors are keyed by Rust field name; the wire format is camelCase
fn camel_case(field: &str) -> String {
    let mut parts = field.split('_');
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        let errors = errors
            .errors()
            .iter()
            .filter_map(|(field, kind)| match kind {
                ValidationErrorsKind::Field(field_errors) => field_errors.first().map(|err| {
                    let message = err.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("invalid {}", err.code));
                    (camel_case(field), message)
                }),
                _ => None,
            })
            .collect();

        Error::Validation { errors }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::BadRequest {
            message: rejection.body_text(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
