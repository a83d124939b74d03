// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker runtime: polls a task queue and runs registered functions.
//!
//! The worker long-polls the engine for tasks, resolves each task's function
//! in the [`Registry`] and runs it on its own tokio task. Concurrency is gated
//! by a semaphore of `max_concurrent_tasks` permits that is acquired before
//! polling, so the worker never takes a task it has no capacity for.
//!
//! Outcomes are reported back to the engine; there are no local retries. A
//! panicking function is reported as a failed task. Tasks still running when
//! the shutdown grace period ends are dropped without reporting anything, so
//! the engine's own timeouts decide what happens to them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::backend::EngineBackend;
use crate::backend::http::HttpEngine;
use crate::config::SdkConfig;
use crate::context::{ActivityContext, WorkflowContext};
use crate::error::{Result, SdkError};
use crate::registry::{Handler, Registry};
use crate::types::{PolledTask, TaskKind, TaskOutcome};

/// Tuning for a [`Worker`].
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Task queue to poll
    pub task_queue: String,
    /// Long-poll wait per poll request
    pub poll_timeout: Duration,
    /// Maximum number of tasks executing at once
    pub max_concurrent_tasks: usize,
    /// How long shutdown waits for in-flight tasks (default: 10s)
    pub shutdown_grace: Duration,
    /// Consecutive poll failures after which the worker gives up (default: 10)
    pub max_poll_failures: u32,
    /// Pause between failed polls (default: 1s)
    pub poll_retry_delay: Duration,
}

impl WorkerOptions {
    /// Options taken from the shared SDK configuration.
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            task_queue: config.task_queue.clone(),
            poll_timeout: config.poll_timeout,
            max_concurrent_tasks: config.max_concurrent_tasks.max(1),
            shutdown_grace: Duration::from_secs(10),
            max_poll_failures: 10,
            poll_retry_delay: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max.max(1);
        self
    }

    #[must_use]
    pub fn with_poll_retry_delay(mut self, delay: Duration) -> Self {
        self.poll_retry_delay = delay;
        self
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from_config(&SdkConfig::default())
    }
}

/// Polls one task queue and executes registered workflows and activities.
pub struct Worker {
    backend: Arc<dyn EngineBackend>,
    registry: Arc<Registry>,
    options: WorkerOptions,
}

impl Worker {
    /// Create a worker on an existing backend.
    pub fn new(backend: Arc<dyn EngineBackend>, registry: Registry, options: WorkerOptions) -> Self {
        Self {
            backend,
            registry: Arc::new(registry),
            options,
        }
    }

    /// Connect to the remote engine described by `config` and create a worker for it.
    pub async fn connect(config: &SdkConfig, registry: Registry) -> Result<Self> {
        let backend = HttpEngine::new(config)?;
        backend.connect().await?;
        Ok(Self::new(
            Arc::new(backend),
            registry,
            WorkerOptions::from_config(config),
        ))
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Backend this worker polls.
    pub fn backend(&self) -> &Arc<dyn EngineBackend> {
        &self.backend
    }

    /// Run the poll loop until `cancel` fires.
    ///
    /// On cancellation polling stops at once, then in-flight tasks get up to
    /// `shutdown_grace` to finish. Tasks still running after that are
    /// abandoned: the worker stops waiting on them and reports no outcome. Returns
    /// [`SdkError::Runtime`] after `max_poll_failures` consecutive failed polls.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_tasks));
        let tracker = TaskTracker::new();
        let abandon = CancellationToken::new();
        let mut failures: u32 = 0;

        info!(
            task_queue = %self.options.task_queue,
            engine = self.backend.engine_type(),
            max_concurrent_tasks = self.options.max_concurrent_tasks,
            workflows = ?self.registry.names(TaskKind::Workflow),
            activities = ?self.registry.names(TaskKind::Activity),
            "Worker started"
        );

        let outcome = loop {
            let permit = tokio::select! {
                biased;

                _ = cancel.cancelled() => break Ok(()),
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Err(SdkError::Runtime("task slots closed".to_string())),
                },
            };

            let polled = tokio::select! {
                biased;

                _ = cancel.cancelled() => break Ok(()),
                polled = self.backend.poll_task(&self.options.task_queue, self.options.poll_timeout) => polled,
            };

            match polled {
                Ok(Some(task)) => {
                    failures = 0;
                    debug!(
                        task_token = %task.task_token,
                        kind = %task.kind,
                        name = %task.name,
                        workflow_id = %task.workflow_id,
                        "Task received"
                    );
                    tracker.spawn(execute(
                        self.backend.clone(),
                        self.registry.clone(),
                        self.options.task_queue.clone(),
                        task,
                        permit,
                        abandon.clone(),
                    ));
                }
                Ok(None) => {
                    failures = 0;
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        error = %e,
                        failures,
                        max_poll_failures = self.options.max_poll_failures,
                        "Task poll failed"
                    );
                    if failures >= self.options.max_poll_failures {
                        break Err(SdkError::Runtime(format!(
                            "{} consecutive poll failures, last: {}",
                            failures, e
                        )));
                    }
                    drop(permit);
                    tokio::select! {
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.options.poll_retry_delay) => {}
                    }
                }
            }
        };

        tracker.close();
        if !tracker.is_empty() {
            info!(in_flight = tracker.len(), "Waiting for in-flight tasks");
            if tokio::time::timeout(self.options.shutdown_grace, tracker.wait())
                .await
                .is_err()
            {
                warn!(
                    in_flight = tracker.len(),
                    grace_ms = self.options.shutdown_grace.as_millis() as u64,
                    "Abandoning tasks still running after shutdown grace period"
                );
                abandon.cancel();
                tracker.wait().await;
            }
        }

        match &outcome {
            Ok(()) => info!("Worker stopped"),
            Err(e) => error!(error = %e, "Worker stopped with error"),
        }
        outcome
    }
}

/// Run one task and report its outcome.
async fn execute(
    backend: Arc<dyn EngineBackend>,
    registry: Arc<Registry>,
    task_queue: String,
    task: PolledTask,
    permit: OwnedSemaphorePermit,
    abandon: CancellationToken,
) {
    let running = match registry.resolve(task.kind, &task.name) {
        Ok(Handler::Activity(function)) => {
            let ctx = ActivityContext::new(&task);
            run_guarded(&task, function(ctx, task.input.clone())).boxed()
        }
        Ok(Handler::Workflow(function)) => {
            let ctx = WorkflowContext::new(backend.clone(), &task, task_queue).with_slot(permit);
            run_guarded(&task, function(ctx, task.input.clone())).boxed()
        }
        Err(e) => {
            warn!(kind = %task.kind, name = %task.name, "No function registered for task");
            futures::future::ready(TaskOutcome::Failed(e.to_string())).boxed()
        }
    };

    let outcome = tokio::select! {
        outcome = running => outcome,
        _ = abandon.cancelled() => {
            warn!(
                task_token = %task.task_token,
                kind = %task.kind,
                name = %task.name,
                "Task abandoned at shutdown, outcome left to the engine"
            );
            return;
        }
    };

    if let TaskOutcome::Failed(message) = &outcome {
        info!(kind = %task.kind, name = %task.name, error = %message, "Task failed");
    } else {
        debug!(kind = %task.kind, name = %task.name, "Task completed");
    }

    if let Err(e) = backend.complete_task(&task.task_token, outcome).await {
        warn!(
            error = %e,
            task_token = %task.task_token,
            kind = %task.kind,
            name = %task.name,
            "Failed to report task outcome"
        );
    }
}

async fn run_guarded(
    task: &PolledTask,
    function: futures::future::BoxFuture<'static, anyhow::Result<serde_json::Value>>,
) -> TaskOutcome {
    match AssertUnwindSafe(function).catch_unwind().await {
        Ok(Ok(output)) => TaskOutcome::Completed(output),
        Ok(Err(e)) => TaskOutcome::Failed(format!("{:#}", e)),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(kind = %task.kind, name = %task.name, panic = %message, "Task panicked");
            TaskOutcome::Failed(format!("{} {} panicked: {}", task.kind, task.name, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
