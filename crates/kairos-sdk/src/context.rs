// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution contexts handed to registered functions.
//!
//! A workflow function receives a [`WorkflowContext`] it uses to schedule
//! activities and await their results. An activity function receives an
//! [`ActivityContext`] describing the task it is running.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OwnedSemaphorePermit};
use tracing::{debug, instrument};

use crate::backend::EngineBackend;
use crate::error::Result;
use crate::types::{ActivityOptions, PolledTask, WorkUnitHandle};

/// Context of one running activity task.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    activity_id: String,
    activity_type: String,
    execution: WorkUnitHandle,
}

impl ActivityContext {
    pub(crate) fn new(task: &PolledTask) -> Self {
        Self {
            activity_id: task.activity_id.clone().unwrap_or_default(),
            activity_type: task.name.clone(),
            execution: task.execution(),
        }
    }

    /// Engine-assigned activity id.
    pub fn activity_id(&self) -> &str {
        &self.activity_id
    }

    /// Registered activity type name.
    pub fn activity_type(&self) -> &str {
        &self.activity_type
    }

    /// Workflow execution that scheduled this activity.
    pub fn execution(&self) -> &WorkUnitHandle {
        &self.execution
    }
}

/// Context of one running workflow task.
///
/// Cloning is cheap; clones share the engine connection and the worker slot.
#[derive(Clone)]
pub struct WorkflowContext {
    backend: Arc<dyn EngineBackend>,
    execution: WorkUnitHandle,
    workflow_type: String,
    task_queue: String,
    activity_options: ActivityOptions,
    /// Worker concurrency slot, released on the first activity wait
    slot: Arc<Mutex<Option<OwnedSemaphorePermit>>>,
}

impl WorkflowContext {
    pub(crate) fn new(
        backend: Arc<dyn EngineBackend>,
        task: &PolledTask,
        task_queue: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            execution: task.execution(),
            workflow_type: task.name.clone(),
            task_queue: task_queue.into(),
            activity_options: ActivityOptions::default(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Attach the worker slot this task occupies.
    pub(crate) fn with_slot(self, permit: OwnedSemaphorePermit) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(permit))),
            ..self
        }
    }

    /// Handle of the running execution.
    pub fn execution(&self) -> &WorkUnitHandle {
        &self.execution
    }

    pub fn workflow_id(&self) -> &str {
        &self.execution.id
    }

    pub fn run_id(&self) -> &str {
        &self.execution.run_id
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    /// Options applied to activities scheduled from this context.
    pub fn activity_options(&self) -> &ActivityOptions {
        &self.activity_options
    }

    /// Use `options` for activities scheduled from the returned context.
    pub fn with_activity_options(mut self, options: ActivityOptions) -> Self {
        self.activity_options = options;
        self
    }

    /// Schedule an activity on the workflow's task queue and wait for its result.
    ///
    /// The engine enforces the start-to-close timeout from the moment a worker
    /// picks the activity up. Failures of the activity, including a timeout,
    /// are returned as errors; the caller decides whether they fail the
    /// workflow.
    ///
    /// A suspended workflow does not count against the worker's concurrency
    /// limit, so the activity can always be picked up by the same worker.
    #[instrument(skip(self, input), fields(workflow_id = %self.execution.id, activity_type = %activity_type))]
    pub async fn execute_activity<I, O>(&self, activity_type: &str, input: &I) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input)?;

        let activity_id = self
            .backend
            .schedule_activity(
                &self.execution,
                &self.task_queue,
                activity_type,
                input,
                &self.activity_options,
            )
            .await?;
        if self.slot.lock().await.take().is_some() {
            debug!("Released worker slot while suspended");
        }
        debug!(activity_id = %activity_id, "Awaiting activity result");

        let output = self.backend.activity_result(&activity_id).await?;
        Ok(serde_json::from_value(output)?)
    }
}
