// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Client for starting workflows and querying their status.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::backend::EngineBackend;
use crate::backend::http::HttpEngine;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::types::{
    StartWorkflowOptions, WorkUnitHandle, WorkUnitOutput, WorkUnitStatus, WorkUnitStatusView,
};

/// Client side of the engine: starts workflows and reads their results.
///
/// The client is cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```ignore
/// use kairos_sdk::{DurableClient, SdkConfig, StartWorkflowOptions, WorkUnitInput};
///
/// let config = SdkConfig::from_env()?;
/// let client = DurableClient::connect(&config).await?;
///
/// let handle = client
///     .start(
///         StartWorkflowOptions::new("hello-workflow-1", &config.task_queue),
///         "HelloWorkflow",
///         &WorkUnitInput { name: "Ada".to_string() },
///     )
///     .await?;
///
/// let view = client.query_status::<WorkUnitOutput>(&handle.id, &handle.run_id).await;
/// ```
pub struct DurableClient {
    backend: Arc<dyn EngineBackend>,
    status_wait: Duration,
}

impl DurableClient {
    /// Connect to the remote engine described by `config`.
    ///
    /// Fails with [`SdkError::Connection`] when the engine does not answer its
    /// health check.
    #[instrument(skip(config), fields(engine_addr = %config.engine_addr))]
    pub async fn connect(config: &SdkConfig) -> Result<Self> {
        let backend = HttpEngine::new(config)?;
        backend.connect().await?;
        info!("Client connected");

        Ok(Self::with_backend(Arc::new(backend)).with_status_wait(config.status_wait))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Arc<dyn EngineBackend>) -> Self {
        Self {
            backend,
            status_wait: Duration::ZERO,
        }
    }

    /// Set how long [`query_status`](Self::query_status) waits for a result.
    #[must_use]
    pub fn with_status_wait(mut self, wait: Duration) -> Self {
        self.status_wait = wait;
        self
    }

    pub fn backend(&self) -> &Arc<dyn EngineBackend> {
        &self.backend
    }

    pub async fn is_connected(&self) -> bool {
        self.backend.is_connected().await
    }

    /// Release the engine connection.
    pub async fn close(&self) {
        self.backend.close().await;
        info!("Client closed");
    }

    /// Submit a workflow for execution without waiting for it to run.
    ///
    /// Any failure is reported as [`SdkError::Start`] carrying the cause's text.
    #[instrument(skip(self, options, input), fields(workflow_id = %options.id, task_queue = %options.task_queue))]
    pub async fn start<I>(
        &self,
        options: StartWorkflowOptions,
        workflow_type: &str,
        input: &I,
    ) -> Result<WorkUnitHandle>
    where
        I: Serialize + ?Sized,
    {
        let input = serde_json::to_value(input).map_err(|e| SdkError::Start(e.to_string()))?;

        let handle = self
            .backend
            .start_workflow(&options, workflow_type, input)
            .await
            .map_err(|e| SdkError::Start(e.to_string()))?;

        info!(run_id = %handle.run_id, workflow_type = %workflow_type, "Workflow started");
        Ok(handle)
    }

    /// Status of one execution, fetched fresh from the engine.
    ///
    /// Never fails: a completed execution yields `completed` with its result;
    /// anything else (still running, failed, unknown id, transport error)
    /// yields `failed-or-running` with the error text.
    #[instrument(skip(self), fields(wait_ms = self.status_wait.as_millis() as u64))]
    pub async fn query_status<O>(&self, workflow_id: &str, run_id: &str) -> WorkUnitStatusView<O>
    where
        O: DeserializeOwned,
    {
        let fetched = self
            .backend
            .workflow_result(workflow_id, run_id, self.status_wait)
            .await
            .and_then(|output| serde_json::from_value::<O>(output).map_err(SdkError::from));

        let (status, result, error) = match fetched {
            Ok(output) => (WorkUnitStatus::Completed, Some(output), None),
            Err(e) => {
                debug!(error = %e, "Workflow result not available");
                (WorkUnitStatus::FailedOrRunning, None, Some(e.to_string()))
            }
        };

        WorkUnitStatusView {
            workflow_id: workflow_id.to_string(),
            run_id: run_id.to_string(),
            status,
            result,
            error,
        }
    }

    /// [`query_status`](Self::query_status) for the hello workflow's output type.
    pub async fn query_work_unit(&self, workflow_id: &str, run_id: &str) -> WorkUnitStatusView {
        self.query_status::<WorkUnitOutput>(workflow_id, run_id).await
    }
}
