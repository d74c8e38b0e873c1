use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    database::Replace,
    error::AppError,
    models::{Bug, FieldError},
    query::{BugQuery, ListParams, Pagination},
    state::AppState,
    stats::{Stats, aggregate_stats},
    utils::{Envelope, get_input_from_body, get_object_from_body, parse_id, read_body},
    validation::{validate, validate_status},
};

type Reply<T> = Result<Json<Envelope<T>>, AppError>;

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "OK", "timestamp": Utc::now().to_rfc3339() })),
    )
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Reply<Vec<Bug>> {
    let params = match params {
        Ok(Query(pairs)) => ListParams::from_pairs(pairs),
        Err(rejection) => {
            warn!("Ignoring unreadable query string: {rejection}");
            ListParams::default()
        }
    };
    let query = BugQuery::build(&params);
    let (bugs, total) = state.store.find(&query).await?;
    let pagination = Pagination::new(&query, total, bugs.len());

    Ok(Json(Envelope::data(bugs).with_pagination(pagination)))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Reply<Stats> {
    let bugs = state.store.all().await?;

    Ok(Json(Envelope::data(aggregate_stats(&bugs))))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
) -> Reply<Bug> {
    let id = parse_id(id)?;
    let bug = state.store.get(&id).await?.ok_or(AppError::NotFound)?;

    Ok(Json(Envelope::data(bug)))
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Envelope<Bug>>), AppError> {
    let input = get_input_from_body(&read_body(body)?)?.sanitized();
    let fields = validate(&input).map_err(rejected)?;

    let bug = Bug::create(fields, Utc::now());
    state.store.insert(&bug).await?;

    info!(id = %bug.id, "Created bug");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(bug).with_message("Bug created successfully")),
    ))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Reply<Bug> {
    let id = parse_id(id)?;
    let input = get_input_from_body(&read_body(body)?)?;

    let mut bug = state.store.get(&id).await?.ok_or(AppError::NotFound)?;
    let read_at = bug.updated_at;
    let fields = validate(&input.sanitized().merged_over(&bug)).map_err(rejected)?;
    bug.apply(fields, Utc::now());

    write_back(&state, &bug, read_at).await?;

    info!(id = %bug.id, "Updated bug");

    Ok(Json(Envelope::data(bug).with_message("Bug updated successfully")))
}

pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Reply<Bug> {
    let id = parse_id(id)?;
    let body = get_object_from_body(&read_body(body)?)?;
    let status = validate_status(body.get("status")).map_err(rejected)?;

    let mut bug = state.store.get(&id).await?.ok_or(AppError::NotFound)?;
    let read_at = bug.updated_at;
    bug.status = status;
    bug.touch(Utc::now());

    write_back(&state, &bug, read_at).await?;

    info!(id = %bug.id, status = status.as_str(), "Updated bug status");

    Ok(Json(Envelope::data(bug).with_message("Bug status updated successfully")))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
) -> Reply<Bug> {
    let id = parse_id(id)?;
    let bug = state.store.delete(&id).await?.ok_or(AppError::NotFound)?;

    info!(id = %bug.id, "Deleted bug");

    Ok(Json(Envelope::data(bug).with_message("Bug deleted successfully")))
}

/// Stores an edit of a bug read at `read_at`.
async fn write_back(state: &AppState, bug: &Bug, read_at: DateTime<Utc>) -> Result<(), AppError> {
    match state.store.replace(bug, read_at).await? {
        Replace::Replaced => Ok(()),
        Replace::Missing => Err(AppError::NotFound),
        Replace::Stale => {
            warn!(id = %bug.id, "Bug changed while being edited");
            Err(AppError::Conflict)
        }
    }
}

fn rejected(errors: Vec<FieldError>) -> AppError {
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    warn!("Rejected bug, invalid fields: {}", fields.join(", "));

    AppError::Validation(errors)
}
