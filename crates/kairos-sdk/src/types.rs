// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types shared by the client, the worker and the engine backends.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input passed when starting the hello workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitInput {
    pub name: String,
}

/// Output produced by the hello workflow on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitOutput {
    pub message: String,
}

/// Identifies one execution of a workflow. Returned by the engine at start time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnitHandle {
    #[serde(rename = "workflowId")]
    pub id: String,
    pub run_id: String,
}

impl WorkUnitHandle {
    pub fn new(id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Coarse status reported by status queries.
///
/// An execution that is still in flight and one that failed are reported the
/// same way, because both surface as an error from the result fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkUnitStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed-or-running")]
    FailedOrRunning,
}

impl fmt::Display for WorkUnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnitStatus::Completed => write!(f, "completed"),
            WorkUnitStatus::FailedOrRunning => write!(f, "failed-or-running"),
        }
    }
}

/// Status view of one execution, rebuilt from the engine on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnitStatusView<T = WorkUnitOutput> {
    pub workflow_id: String,
    pub run_id: String,
    pub status: WorkUnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> WorkUnitStatusView<T> {
    /// True when the execution completed and a result is present.
    pub fn is_completed(&self) -> bool {
        self.status == WorkUnitStatus::Completed
    }
}

/// Options for submitting a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartWorkflowOptions {
    /// Caller-chosen workflow id
    pub id: String,
    /// Task queue the workflow task is placed on
    pub task_queue: String,
}

impl StartWorkflowOptions {
    pub fn new(id: impl Into<String>, task_queue: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_queue: task_queue.into(),
        }
    }
}

/// Per-activity execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityOptions {
    /// Maximum time a single attempt may run once a worker has picked it up.
    pub start_to_close_timeout: Duration,
}

impl ActivityOptions {
    pub fn start_to_close(timeout: Duration) -> Self {
        Self {
            start_to_close_timeout: timeout,
        }
    }
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self::start_to_close(Duration::from_secs(10))
    }
}

/// Kind of function a task is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Workflow,
    Activity,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Workflow => write!(f, "workflow"),
            TaskKind::Activity => write!(f, "activity"),
        }
    }
}

/// A unit of work handed to a worker by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledTask {
    /// Opaque token used to report the outcome
    pub task_token: String,
    pub kind: TaskKind,
    /// Registered workflow or activity type name
    pub name: String,
    pub input: Value,
    pub workflow_id: String,
    pub run_id: String,
    /// Set for activity tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    /// Set for activity tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_to_close_timeout_ms: Option<u64>,
    pub scheduled_at: DateTime<Utc>,
}

impl PolledTask {
    /// Handle of the workflow execution this task belongs to.
    pub fn execution(&self) -> WorkUnitHandle {
        WorkUnitHandle::new(&self.workflow_id, &self.run_id)
    }
}

/// Result of running a task, reported back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(Value),
    Failed(String),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }
}
