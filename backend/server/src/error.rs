use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{database::StoreError, models::FieldError, utils::Envelope};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid bug ID format")]
    InvalidId,

    #[error("Malformed request body")]
    MalformedPayload,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Bug not found")]
    NotFound,

    #[error("Bug was modified by another request, please retry")]
    Conflict,

    #[error("Too many requests, please try again later")]
    RateLimited(Duration),

    #[error("Server error")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidId { .. } => StatusCode::BAD_REQUEST,
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut envelope = Envelope::<()>::failure(self.to_string());
        let mut retry_after = None;

        match self {
            AppError::Validation(errors) => envelope.errors = Some(errors),
            AppError::RateLimited(wait) => {
                // Whole seconds, rounded up.
                let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                retry_after = Some(HeaderValue::from(seconds.max(1)));
            }
            AppError::Store(source) => {
                error!("Store failure: {source}");

                #[cfg(feature = "verbose")]
                {
                    envelope.error = Some(source.to_string());
                }
            }
            _ => {}
        }

        let mut response = (status, Json(envelope)).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, seconds);
        }

        response
    }
}
