// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kairos Server - HTTP trigger API for the hello workflow.
//!
//! Translates HTTP requests into [`DurableClient`] calls:
//!
//! - `POST /trigger` starts a `HelloWorkflow` for `{"name": ...}`
//! - `GET /status/{id}?runId=` reports the execution's status
//!
//! In embedded mode the server also hosts the engine and a hello worker, so a
//! single process serves the whole round trip.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

use std::sync::Arc;

use kairos_sdk::DurableClient;

pub use config::{Config, ConfigError, EngineMode};
pub use error::ApiError;
pub use router::build_router;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<DurableClient>,
    /// Queue new workflows are started on
    pub task_queue: String,
}

impl AppState {
    pub fn new(client: Arc<DurableClient>, task_queue: impl Into<String>) -> Self {
        Self {
            client,
            task_queue: task_queue.into(),
        }
    }
}
