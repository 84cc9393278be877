use axum::{Json, http::StatusCode, response::IntoResponse};
use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::deadpool::PoolError;
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// A concurrent mutation won the race, or the request is a duplicate of
    /// one still inside the de-duplication window.
    #[error("{0}")]
    Conflict(String),

    /// Storage did not answer in time. Never assume the operation committed.
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Database error")]
    Database(#[source] diesel::result::Error),

    #[error("Database connection unavailable")]
    Pool(#[from] PoolError),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Conflict(_) | Error::Unavailable(_) | Error::Pool(_)
        )
    }

    fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Conflict(_) => "CONFLICT",
            Error::Unavailable(_) | Error::Pool(_) => "UNAVAILABLE",
            Error::Invalid(_) => "INVALID",
            Error::Database(_) => "DATABASE_ERR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unavailable(_) | Error::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Invalid(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => Error::NotFound("Record not found".into()),
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::SerializationFailure,
                ref info,
            ) => {
                tracing::warn!(message = info.message(), "concurrent write lost the race");
                Error::Conflict("Another request modified this item, please retry".into())
            }
            e => Error::Database(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();

        if let Error::Database(ref e) = self {
            tracing::error!(err = %e, "database error");
        }
        if let Error::Pool(ref e) = self {
            tracing::error!(err = %e, "could not get a database connection");
        }

        let body = ErrorResponse {
            code: self.code(),
            msg: Some(self.to_string()),
        };

        (status_code, Json(body)).into_response()
    }
}
