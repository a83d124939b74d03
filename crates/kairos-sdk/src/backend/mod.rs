// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine backend implementations.
//!
//! This module provides different backends for talking to the orchestration engine:
//! - `http`: a remote engine reached over its HTTP/JSON API (default)
//! - `embedded`: an in-process, in-memory engine for tests and local development

pub mod embedded;
pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::{ActivityOptions, PolledTask, StartWorkflowOptions, TaskOutcome, WorkUnitHandle};

/// Backend trait for engine operations.
///
/// This trait abstracts the engine transport so the client and the worker work
/// the same way against a remote engine or the embedded one. Implementations
/// must be safe to share between concurrent request handlers and worker tasks.
#[async_trait]
pub trait EngineBackend: Send + Sync {
    /// Short name of the backend, used in logs.
    fn engine_type(&self) -> &'static str;

    /// Connect to the engine and verify it is reachable.
    async fn connect(&self) -> Result<()>;

    /// Check if connected.
    async fn is_connected(&self) -> bool;

    /// Release the connection.
    async fn close(&self);

    /// Submit a workflow for asynchronous execution.
    async fn start_workflow(
        &self,
        options: &StartWorkflowOptions,
        workflow_type: &str,
        input: Value,
    ) -> Result<WorkUnitHandle>;

    /// Fetch the result of a workflow execution, waiting at most `wait`.
    ///
    /// An empty `run_id` addresses the latest run for `workflow_id`. Returns
    /// `StillRunning` when the execution is not terminal once `wait` has elapsed,
    /// and `WorkflowFailed` when it finished with an error.
    async fn workflow_result(&self, workflow_id: &str, run_id: &str, wait: Duration)
    -> Result<Value>;

    /// Long-poll a task queue for the next task, waiting at most `wait`.
    async fn poll_task(&self, task_queue: &str, wait: Duration) -> Result<Option<PolledTask>>;

    /// Schedule an activity on behalf of a running workflow. Returns the activity id.
    async fn schedule_activity(
        &self,
        execution: &WorkUnitHandle,
        task_queue: &str,
        activity_type: &str,
        input: Value,
        options: &ActivityOptions,
    ) -> Result<String>;

    /// Wait for an activity to finish. The engine enforces the start-to-close
    /// timeout given when the activity was scheduled.
    async fn activity_result(&self, activity_id: &str) -> Result<Value>;

    /// Report the outcome of a polled task.
    async fn complete_task(&self, task_token: &str, outcome: TaskOutcome) -> Result<()>;
}
