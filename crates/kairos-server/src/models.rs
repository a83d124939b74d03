// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

/// Body of `POST /trigger`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerRequest {
    /// A missing name is treated like an empty one
    #[serde(default)]
    pub name: String,
}

/// Successful trigger response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub workflow_id: String,
    pub run_id: String,
    pub message: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub message: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query string of the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub run_id: String,
}
