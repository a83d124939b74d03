// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded engine backend.
//!
//! An in-process stand-in for the orchestration engine: task queues, workflow
//! runs and activities live in memory. Nothing is persisted and nothing is
//! retried, so it is only suitable for tests and local development where the
//! trigger service and the worker share one process. Finished runs and
//! activities are never pruned; memory grows with every execution for the
//! lifetime of the engine. A task abandoned by a worker stays in flight and
//! is not redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::EngineBackend;
use crate::error::{Result, SdkError};
use crate::types::{
    ActivityOptions, PolledTask, StartWorkflowOptions, TaskKind, TaskOutcome, WorkUnitHandle,
};

/// Engine-side state of a workflow run.
#[derive(Debug, Clone, PartialEq)]
enum ExecutionState {
    Scheduled,
    Running,
    Completed(Value),
    Failed(String),
}

impl ExecutionState {
    fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Completed(_) | ExecutionState::Failed(_))
    }
}

/// Engine-side state of an activity.
#[derive(Debug, Clone, PartialEq)]
enum ActivityState {
    Scheduled,
    Started(Instant),
    Completed(Value),
    Failed(String),
    TimedOut,
}

impl ActivityState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityState::Completed(_) | ActivityState::Failed(_) | ActivityState::TimedOut
        )
    }
}

struct WorkflowRun {
    run_id: String,
    workflow_type: String,
    state: watch::Sender<ExecutionState>,
}

struct ActivityRecord {
    activity_type: String,
    start_to_close: Duration,
    state: watch::Sender<ActivityState>,
}

/// What an in-flight task token refers to.
enum InFlight {
    Workflow { workflow_id: String, run_id: String },
    Activity { activity_id: String },
}

#[derive(Default)]
struct EngineState {
    /// Runs per workflow id, oldest first; kept until the engine is dropped
    runs: HashMap<String, Vec<WorkflowRun>>,
    activities: HashMap<String, ActivityRecord>,
    queues: HashMap<String, VecDeque<PolledTask>>,
    in_flight: HashMap<String, InFlight>,
}

impl EngineState {
    fn find_run(&self, workflow_id: &str, run_id: &str) -> Option<&WorkflowRun> {
        let runs = self.runs.get(workflow_id)?;
        if run_id.is_empty() {
            runs.last()
        } else {
            runs.iter().find(|run| run.run_id == run_id)
        }
    }

    fn dequeue(&mut self, task_queue: &str) -> Option<PolledTask> {
        let task = self.queues.get_mut(task_queue)?.pop_front()?;

        match task.kind {
            TaskKind::Workflow => {
                if let Some(run) = self.find_run(&task.workflow_id, &task.run_id) {
                    run.state.send_if_modified(|state| {
                        if *state == ExecutionState::Scheduled {
                            *state = ExecutionState::Running;
                            true
                        } else {
                            false
                        }
                    });
                }
                self.in_flight.insert(
                    task.task_token.clone(),
                    InFlight::Workflow {
                        workflow_id: task.workflow_id.clone(),
                        run_id: task.run_id.clone(),
                    },
                );
            }
            TaskKind::Activity => {
                let activity_id = task.activity_id.clone().unwrap_or_default();
                if let Some(record) = self.activities.get(&activity_id) {
                    record.state.send_replace(ActivityState::Started(Instant::now()));
                }
                self.in_flight
                    .insert(task.task_token.clone(), InFlight::Activity { activity_id });
            }
        }

        Some(task)
    }
}

/// In-memory engine backend.
///
/// Share it between a [`DurableClient`](crate::DurableClient) and a
/// [`Worker`](crate::Worker) through an `Arc` to run both halves in one process.
pub struct EmbeddedEngine {
    state: Mutex<EngineState>,
    task_available: Notify,
    closed: AtomicBool,
}

impl Default for EmbeddedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            task_available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of workflow runs ever started.
    pub async fn workflow_count(&self) -> usize {
        let state = self.state.lock().await;
        state.runs.values().map(Vec::len).sum()
    }

    /// Number of tasks waiting on a queue.
    pub async fn queue_depth(&self, task_queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(task_queue).map_or(0, VecDeque::len)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SdkError::Connection("embedded engine is closed".to_string()));
        }
        Ok(())
    }

    async fn enqueue(&self, task_queue: &str, task: PolledTask) {
        {
            let mut state = self.state.lock().await;
            state
                .queues
                .entry(task_queue.to_string())
                .or_default()
                .push_back(task);
        }
        self.task_available.notify_waiters();
    }

    /// Mark a started activity as timed out and drop its task token so a late
    /// completion is ignored.
    async fn time_out_activity(&self, activity_id: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.activities.get(activity_id) {
            record.state.send_if_modified(|current| {
                if matches!(current, ActivityState::Started(_)) {
                    *current = ActivityState::TimedOut;
                    true
                } else {
                    false
                }
            });
        }
        state.in_flight.retain(|_, entry| {
            !matches!(entry, InFlight::Activity { activity_id: id } if id.as_str() == activity_id)
        });
    }
}

fn describe(workflow_id: &str, run_id: &str) -> String {
    if run_id.is_empty() {
        workflow_id.to_string()
    } else {
        format!("{} (run {})", workflow_id, run_id)
    }
}

#[async_trait]
impl EngineBackend for EmbeddedEngine {
    fn engine_type(&self) -> &'static str {
        "embedded"
    }

    async fn connect(&self) -> Result<()> {
        self.closed.store(false, Ordering::SeqCst);
        debug!("Embedded engine: connect is a no-op");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.task_available.notify_waiters();
        debug!("Embedded engine closed");
    }

    #[instrument(skip(self, options, input), fields(workflow_id = %options.id, task_queue = %options.task_queue))]
    async fn start_workflow(
        &self,
        options: &StartWorkflowOptions,
        workflow_type: &str,
        input: Value,
    ) -> Result<WorkUnitHandle> {
        self.ensure_open()?;

        let run_id = Uuid::new_v4().to_string();
        let task = PolledTask {
            task_token: Uuid::new_v4().to_string(),
            kind: TaskKind::Workflow,
            name: workflow_type.to_string(),
            input,
            workflow_id: options.id.clone(),
            run_id: run_id.clone(),
            activity_id: None,
            start_to_close_timeout_ms: None,
            scheduled_at: Utc::now(),
        };

        {
            let mut state = self.state.lock().await;
            if let Some(latest) = state.runs.get(&options.id).and_then(|runs| runs.last())
                && !latest.state.borrow().is_terminal()
            {
                return Err(SdkError::AlreadyStarted(options.id.clone()));
            }

            let (sender, _) = watch::channel(ExecutionState::Scheduled);
            state
                .runs
                .entry(options.id.clone())
                .or_default()
                .push(WorkflowRun {
                    run_id: run_id.clone(),
                    workflow_type: workflow_type.to_string(),
                    state: sender,
                });
        }

        self.enqueue(&options.task_queue, task).await;

        info!(run_id = %run_id, workflow_type = %workflow_type, "Workflow scheduled");
        Ok(WorkUnitHandle::new(&options.id, run_id))
    }

    #[instrument(skip(self), fields(wait_ms = wait.as_millis() as u64))]
    async fn workflow_result(
        &self,
        workflow_id: &str,
        run_id: &str,
        wait: Duration,
    ) -> Result<Value> {
        let mut receiver = {
            let state = self.state.lock().await;
            let run = state
                .find_run(workflow_id, run_id)
                .ok_or_else(|| SdkError::WorkflowNotFound(describe(workflow_id, run_id)))?;
            debug!(workflow_type = %run.workflow_type, run_id = %run.run_id, "Found workflow run");
            run.state.subscribe()
        };

        if !wait.is_zero() && !receiver.borrow().is_terminal() {
            let _ = tokio::time::timeout(wait, receiver.wait_for(ExecutionState::is_terminal)).await;
        }

        let current = receiver.borrow().clone();
        match current {
            ExecutionState::Completed(output) => Ok(output),
            ExecutionState::Failed(message) => Err(SdkError::WorkflowFailed(message)),
            ExecutionState::Scheduled | ExecutionState::Running => {
                Err(SdkError::StillRunning(describe(workflow_id, run_id)))
            }
        }
    }

    async fn poll_task(&self, task_queue: &str, wait: Duration) -> Result<Option<PolledTask>> {
        let deadline = Instant::now() + wait;

        loop {
            self.ensure_open()?;

            let notified = self.task_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.state.lock().await.dequeue(task_queue) {
                debug!(task_token = %task.task_token, kind = %task.kind, name = %task.name, "Task dispatched");
                return Ok(Some(task));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    #[instrument(skip(self, input, options), fields(workflow_id = %execution.id, activity_type = %activity_type))]
    async fn schedule_activity(
        &self,
        execution: &WorkUnitHandle,
        task_queue: &str,
        activity_type: &str,
        input: Value,
        options: &ActivityOptions,
    ) -> Result<String> {
        self.ensure_open()?;

        let activity_id = Uuid::new_v4().to_string();
        let timeout_ms = options.start_to_close_timeout.as_millis() as u64;

        {
            let mut state = self.state.lock().await;
            let run = state
                .find_run(&execution.id, &execution.run_id)
                .ok_or_else(|| {
                    SdkError::WorkflowNotFound(describe(&execution.id, &execution.run_id))
                })?;
            if run.state.borrow().is_terminal() {
                return Err(SdkError::Server {
                    code: "WORKFLOW_CLOSED".to_string(),
                    message: format!(
                        "cannot schedule activity on closed workflow {}",
                        execution.id
                    ),
                });
            }

            let (sender, _) = watch::channel(ActivityState::Scheduled);
            state.activities.insert(
                activity_id.clone(),
                ActivityRecord {
                    activity_type: activity_type.to_string(),
                    start_to_close: options.start_to_close_timeout,
                    state: sender,
                },
            );
        }

        let task = PolledTask {
            task_token: Uuid::new_v4().to_string(),
            kind: TaskKind::Activity,
            name: activity_type.to_string(),
            input,
            workflow_id: execution.id.clone(),
            run_id: execution.run_id.clone(),
            activity_id: Some(activity_id.clone()),
            start_to_close_timeout_ms: Some(timeout_ms),
            scheduled_at: Utc::now(),
        };
        self.enqueue(task_queue, task).await;

        debug!(activity_id = %activity_id, timeout_ms, "Activity scheduled");
        Ok(activity_id)
    }

    #[instrument(skip(self))]
    async fn activity_result(&self, activity_id: &str) -> Result<Value> {
        let (mut receiver, activity_type, start_to_close) = {
            let state = self.state.lock().await;
            let record = state.activities.get(activity_id).ok_or_else(|| {
                SdkError::UnexpectedResponse(format!("unknown activity {}", activity_id))
            })?;
            (
                record.state.subscribe(),
                record.activity_type.clone(),
                record.start_to_close,
            )
        };

        // Schedule-to-start is unbounded; the timeout clock starts at dispatch.
        receiver
            .wait_for(|state| !matches!(state, ActivityState::Scheduled))
            .await
            .map_err(|_| SdkError::Cancelled)?;

        let started_at = match *receiver.borrow() {
            ActivityState::Started(at) => Some(at),
            _ => None,
        };

        if let Some(started_at) = started_at {
            let deadline = started_at + start_to_close;
            let finished =
                tokio::time::timeout_at(deadline, receiver.wait_for(ActivityState::is_terminal))
                    .await
                    .is_ok();
            if !finished {
                warn!(
                    activity_type = %activity_type,
                    timeout_ms = start_to_close.as_millis() as u64,
                    "Activity exceeded start-to-close timeout"
                );
                self.time_out_activity(activity_id).await;
            }
        }

        let outcome = receiver.borrow().clone();
        self.state.lock().await.activities.remove(activity_id);

        match outcome {
            ActivityState::Completed(output) => Ok(output),
            ActivityState::Failed(message) => Err(SdkError::ActivityFailed {
                activity: activity_type,
                message,
            }),
            ActivityState::TimedOut => Err(SdkError::ActivityTimeout {
                activity: activity_type,
                timeout_ms: start_to_close.as_millis() as u64,
            }),
            ActivityState::Scheduled | ActivityState::Started(_) => Err(
                SdkError::UnexpectedResponse(format!("activity {} did not finish", activity_id)),
            ),
        }
    }

    #[instrument(skip(self, outcome), fields(completed = outcome.is_completed()))]
    async fn complete_task(&self, task_token: &str, outcome: TaskOutcome) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .in_flight
            .remove(task_token)
            .ok_or_else(|| SdkError::TaskNotFound(task_token.to_string()))?;

        match entry {
            InFlight::Workflow {
                workflow_id,
                run_id,
            } => {
                let run = state
                    .find_run(&workflow_id, &run_id)
                    .ok_or_else(|| SdkError::WorkflowNotFound(describe(&workflow_id, &run_id)))?;
                let next = match outcome {
                    TaskOutcome::Completed(output) => ExecutionState::Completed(output),
                    TaskOutcome::Failed(message) => ExecutionState::Failed(message),
                };
                run.state.send_if_modified(|current| {
                    if current.is_terminal() {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                info!(workflow_id = %workflow_id, run_id = %run_id, "Workflow task completed");
            }
            InFlight::Activity { activity_id } => {
                let Some(record) = state.activities.get(&activity_id) else {
                    debug!(activity_id = %activity_id, "Completion for forgotten activity ignored");
                    return Ok(());
                };
                let next = match outcome {
                    TaskOutcome::Completed(output) => ActivityState::Completed(output),
                    TaskOutcome::Failed(message) => ActivityState::Failed(message),
                };
                record.state.send_if_modified(|current| {
                    if current.is_terminal() {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                debug!(activity_id = %activity_id, "Activity task completed");
            }
        }

        Ok(())
    }
}
