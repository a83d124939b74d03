// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Errors returned by the HTTP handlers as `{"error": "..."}` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request input (400)
    #[error("{0}")]
    Validation(String),

    /// The engine refused or failed a workflow submission (500)
    #[error("Failed to start workflow: {0}")]
    StartFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::StartFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
