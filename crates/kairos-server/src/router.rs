// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Router construction.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::handlers;

/// Build the router with all routes and middleware.
///
/// `/trigger` and `/status/{id}` are also served under `/api/workflow/`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/trigger", post(handlers::trigger_workflow))
        .route("/api/workflow/trigger", post(handlers::trigger_workflow))
        .route("/status/", get(handlers::workflow_status_missing_id))
        .route("/status/{workflow_id}", get(handlers::workflow_status))
        .route(
            "/api/workflow/status/",
            get(handlers::workflow_status_missing_id),
        )
        .route(
            "/api/workflow/status/{workflow_id}",
            get(handlers::workflow_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
