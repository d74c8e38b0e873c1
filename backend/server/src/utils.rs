use axum::{
    body::Bytes,
    extract::{
        Path,
        rejection::{BytesRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    error::AppError::{self, InvalidId, MalformedPayload, PayloadTooLarge},
    models::{BugId, FieldError},
    query::Pagination,
    validation::BugInput,
};

/// Body of every `/api/bugs` response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
            pagination: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
            errors: None,
            pagination: None,
            error: None,
        }
    }
}

/// A path segment axum could not decode is as bad as a malformed id.
pub fn parse_id(path: Result<Path<String>, PathRejection>) -> Result<BugId, AppError> {
    match path {
        Ok(Path(raw)) => BugId::parse(&raw).ok_or(InvalidId),
        Err(rejection) => {
            warn!("Rejected bug id: {rejection}");
            Err(InvalidId)
        }
    }
}

pub fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, AppError> {
    body.map_err(|rejection| {
        warn!("Rejected request body: {rejection}");

        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => PayloadTooLarge,
            _ => MalformedPayload,
        }
    })
}

/// Write bodies must be a JSON object.
pub fn get_object_from_body(body: &Bytes) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice::<Value>(body).map_err(|_| MalformedPayload)? {
        Value::Object(map) => Ok(map),
        _ => Err(MalformedPayload),
    }
}

pub fn get_input_from_body(body: &Bytes) -> Result<BugInput, AppError> {
    get_object_from_body(body).map(BugInput::from_map)
}
