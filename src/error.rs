use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::assignments::AssignmentError;
use crate::auth::AuthError;
use crate::certificates::GenerationError;
use crate::db::DatabaseError;
use crate::profile::ProfileError;
use crate::tasks::TaskError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Validation error")]
    Validation(#[from] ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

const INTERNAL: (StatusCode, &str) = (StatusCode::INTERNAL_SERVER_ERROR, "internal_error");

impl AppError {
    /// Status and stable machine-readable code for this error.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(err) => database_status(err),
            AppError::Auth(err) => match err {
                AuthError::MissingCredentials
                | AuthError::InvalidToken(_)
                | AuthError::WrongTokenKind
                | AuthError::IdentityRejected(_)
                | AuthError::AccountNotFound => (StatusCode::UNAUTHORIZED, "unauthorized"),
                AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
                AuthError::NameRequired => (StatusCode::BAD_REQUEST, "name_required"),
                AuthError::IdentityUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "identity_unavailable")
                }
                AuthError::TokenIssue(_) => INTERNAL,
                AuthError::Database(err) => database_status(err),
            },
            AppError::Profile(err) => match err {
                ProfileError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                ProfileError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                ProfileError::FieldLocked { .. } => (StatusCode::BAD_REQUEST, "field_locked"),
                ProfileError::AlreadyInUse { .. } => (StatusCode::CONFLICT, "already_in_use"),
                ProfileError::Database(err) => database_status(err),
            },
            AppError::Assignment(err) => match err {
                AssignmentError::StudentNotFound
                | AssignmentError::ProgramNotFound
                | AssignmentError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                AssignmentError::DuplicateGrant { .. } => (StatusCode::CONFLICT, "duplicate_grant"),
                AssignmentError::ConfirmationRequired => {
                    (StatusCode::BAD_REQUEST, "confirmation_required")
                }
                AssignmentError::Database(err) => database_status(err),
            },
            AppError::Generation(err) => match err {
                GenerationError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                GenerationError::Incomplete(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "enrollment_incomplete")
                }
                GenerationError::Database(err) => database_status(err),
            },
            AppError::Task(_) => INTERNAL,
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::InternalServerError(_) => INTERNAL,
        }
    }

    fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            AppError::Validation(errors) | AppError::Profile(ProfileError::Validation(errors)) => {
                Some(errors)
            }
            _ => None,
        }
    }

    /// Structured context a client can act on.
    fn details(&self) -> Value {
        match self {
            AppError::Profile(ProfileError::FieldLocked { field, .. })
            | AppError::Profile(ProfileError::AlreadyInUse { field }) => json!({ "field": field }),
            AppError::Assignment(AssignmentError::DuplicateGrant { existing }) => {
                json!({ "existing_grant_id": existing })
            }
            AppError::Generation(GenerationError::NotFound(id) | GenerationError::Incomplete(id)) => {
                json!({ "enrollment_id": id })
            }
            _ => Value::Null,
        }
    }
}

fn database_status(err: &DatabaseError) -> (StatusCode, &'static str) {
    match err {
        DatabaseError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        DatabaseError::Duplicate => (StatusCode::CONFLICT, "conflict"),
        DatabaseError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        DatabaseError::Sqlx(_) | DatabaseError::Migration(_) => INTERNAL,
    }
}

/// Field name to its validation messages.
fn field_messages(errors: &ValidationErrors) -> Map<String, Value> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => Value::String(message.to_string()),
                    None => Value::String(format!("Invalid value ({})", e.code)),
                })
                .collect();
            (field.to_string(), Value::Array(messages))
        })
        .collect()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        // Internal details stay in the logs.
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Service unavailable".to_string(),
                _ => "An internal server error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        let mut error = json!({
            "code": code,
            "message": message,
            "details": self.details(),
        });
        if let Some(errors) = self.field_errors() {
            error["fields"] = Value::Object(field_messages(errors));
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
