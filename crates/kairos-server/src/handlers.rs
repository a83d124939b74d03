// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers.
//!
//! Handlers are stateless beyond the shared client: every request maps to one
//! engine call and the response is built from its result.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use tracing::{debug, info, warn};
use uuid::Uuid;

use kairos_sdk::{SdkError, StartWorkflowOptions, WorkUnitInput, WorkUnitStatusView};
use kairos_worker::HELLO_WORKFLOW;

use crate::AppState;
use crate::error::ApiError;
use crate::models::{IndexResponse, StatusQuery, TriggerRequest, TriggerResponse};

/// Prefix of generated workflow ids.
pub const WORKFLOW_ID_PREFIX: &str = "hello-workflow-";

pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: "Kairos Workflow Trigger API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Start a hello workflow for the given name.
pub async fn trigger_workflow(
    State(state): State<AppState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "Rejected trigger body");
        ApiError::Validation("Invalid request body".to_string())
    })?;

    if request.name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }

    let workflow_id = format!("{}{}", WORKFLOW_ID_PREFIX, Uuid::new_v4());
    let options = StartWorkflowOptions::new(&workflow_id, &state.task_queue);
    let input = WorkUnitInput { name: request.name };

    let handle = state
        .client
        .start(options, HELLO_WORKFLOW, &input)
        .await
        .map_err(|e| {
            warn!(workflow_id = %workflow_id, error = %e, "Workflow start failed");
            match e {
                SdkError::Start(cause) => ApiError::StartFailed(cause),
                other => ApiError::StartFailed(other.to_string()),
            }
        })?;

    info!(workflow_id = %handle.id, run_id = %handle.run_id, "Workflow triggered");
    Ok(Json(TriggerResponse {
        workflow_id: handle.id,
        run_id: handle.run_id,
        message: "Workflow triggered successfully".to_string(),
    }))
}

/// Report the status of one execution. Always 200 once an id is present.
pub async fn workflow_status(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<WorkUnitStatusView>, ApiError> {
    if workflow_id.is_empty() {
        return Err(missing_workflow_id());
    }
    let Query(query) = query.map_err(|e| {
        debug!(error = %e, "Rejected status query");
        ApiError::Validation("Invalid query string".to_string())
    })?;

    let view = state
        .client
        .query_work_unit(&workflow_id, &query.run_id)
        .await;
    Ok(Json(view))
}

/// `GET /status/` without an id.
pub async fn workflow_status_missing_id() -> ApiError {
    missing_workflow_id()
}

fn missing_workflow_id() -> ApiError {
    ApiError::Validation("Workflow ID is required".to_string())
}
