use std::time::Duration;

use actix_web::error::UrlGenerationError;
use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use thiserror::Error;

use crate::pipeline::SubmitError;
use crate::rate_limit::RateLimitError;
use crate::views;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Too Many Requests")]
    TooManyRequests { retry_after: Duration },

    #[error("Not Found")]
    NotFound,

    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl From<RateLimitError> for RestError {
    fn from(e: RateLimitError) -> Self {
        Self::TooManyRequests {
            retry_after: e.retry_after,
        }
    }
}

impl From<UrlGenerationError> for RestError {
    fn from(e: UrlGenerationError) -> Self {
        tracing::error!("Failed to generate URL for controller: {}", e);
        Self::InternalError("URL generation".into())
    }
}

impl From<sqlx::Error> for RestError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error.cause_chain = ?e, "Database error");
        Self::InternalError("Database error".into())
    }
}

impl From<SubmitError> for RestError {
    fn from(e: SubmitError) -> Self {
        match e {
            // Already logged by the pipeline
            SubmitError::Storage(_) => Self::InternalError("Signup storage failure".into()),
            // Duplicates are answered by the controller, never as an error
            SubmitError::Duplicate => Self::InternalError("Unhandled duplicate signup".into()),
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut res = HttpResponse::build(self.status_code());
        res.insert_header(ContentType::html());

        match self {
            Self::TooManyRequests { retry_after } => res
                .insert_header((header::RETRY_AFTER, retry_after.as_secs().max(1).to_string()))
                .body(views::too_many_requests_page()),
            Self::NotFound => res.body(views::not_found_page()),
            // Details stay in the logs
            Self::InternalError(_) => res.body(views::error_page()),
        }
    }
}
