// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP engine backend.
//!
//! Talks to a remote orchestration engine over its JSON API under
//! `/api/v1`. Errors are returned by the engine as non-2xx responses with a
//! `{"code", "message"}` body; 404 means the execution is unknown and 409 means
//! a run with the same workflow id is already in flight.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::EngineBackend;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::types::{
    ActivityOptions, PolledTask, StartWorkflowOptions, TaskOutcome, WorkUnitHandle,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowRequest<'a> {
    workflow_id: &'a str,
    task_queue: &'a str,
    workflow_type: &'a str,
    input: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowResponse {
    workflow_id: String,
    run_id: String,
}

/// Result payload shared by workflow and activity result endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
struct ResultResponse {
    status: ResultStatus,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum ResultStatus {
    Completed,
    Failed,
    TimedOut,
    Running,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PollRequest<'a> {
    identity: &'a str,
    wait_ms: u64,
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default)]
    task: Option<PolledTask>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleActivityRequest<'a> {
    activity_type: &'a str,
    task_queue: &'a str,
    input: Value,
    start_to_close_timeout_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleActivityResponse {
    activity_id: String,
    #[serde(default)]
    activity_type: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Everything except RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Remote engine backend over HTTP.
pub struct HttpEngine {
    client: Client,
    base_url: String,
    identity: String,
    request_timeout: Duration,
    connected: AtomicBool,
    /// Activity type and start-to-close timeout per scheduled activity id
    scheduled: ScheduledMap,
}

impl HttpEngine {
    /// Create a backend for the engine configured in `config`.
    ///
    /// No network traffic happens until [`EngineBackend::connect`] is called.
    pub fn new(config: &SdkConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/api/v1", config.engine_url()),
            identity: config.worker_identity.clone(),
            request_timeout: config.request_timeout,
            connected: AtomicBool::new(false),
            scheduled: Mutex::new(HashMap::new()),
        })
    }

    /// Base URL of the engine API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request; the timeout covers the engine-side wait plus the usual
    /// request budget.
    async fn send(&self, request: RequestBuilder, wait: Duration) -> Result<Response> {
        let timeout = self.request_timeout + wait;
        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                SdkError::Timeout(millis(timeout))
            } else {
                SdkError::from(e)
            }
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(self.error_from(response).await)
    }

    async fn error_from(&self, response: Response) -> SdkError {
        let status = response.status();
        let body = response.json::<ErrorBody>().await.ok();
        let code = body
            .as_ref()
            .and_then(|b| b.code.clone())
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = body
            .and_then(|b| b.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status {
            StatusCode::NOT_FOUND => SdkError::WorkflowNotFound(message),
            StatusCode::CONFLICT => SdkError::AlreadyStarted(message),
            _ => SdkError::Server { code, message },
        }
    }
}

#[async_trait]
impl EngineBackend for HttpEngine {
    fn engine_type(&self) -> &'static str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn connect(&self) -> Result<()> {
        let request = self.client.get(self.url("/health"));
        self.send(request, Duration::ZERO).await.map_err(|e| match e {
            SdkError::Connection(msg) => SdkError::Connection(msg),
            other => SdkError::Connection(format!("engine health check failed: {}", other)),
        })?;

        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to engine");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        debug!("Engine connection released");
    }

    #[instrument(skip(self, options, input), fields(workflow_id = %options.id, task_queue = %options.task_queue))]
    async fn start_workflow(
        &self,
        options: &StartWorkflowOptions,
        workflow_type: &str,
        input: Value,
    ) -> Result<WorkUnitHandle> {
        let body = StartWorkflowRequest {
            workflow_id: &options.id,
            task_queue: &options.task_queue,
            workflow_type,
            input,
        };

        let request = self.client.post(self.url("/workflows")).json(&body);
        let response: StartWorkflowResponse =
            self.send(request, Duration::ZERO).await?.json().await?;

        debug!(run_id = %response.run_id, "Workflow accepted by engine");
        Ok(WorkUnitHandle::new(response.workflow_id, response.run_id))
    }

    #[instrument(skip(self), fields(wait_ms = millis(wait)))]
    async fn workflow_result(
        &self,
        workflow_id: &str,
        run_id: &str,
        wait: Duration,
    ) -> Result<Value> {
        let request = self
            .client
            .get(self.url(&format!("/workflows/{}/result", encode(workflow_id))))
            .query(&[("runId", run_id.to_string()), ("waitMs", millis(wait).to_string())]);

        let response: ResultResponse = self.send(request, wait).await?.json().await?;

        match response.status {
            ResultStatus::Completed => Ok(response.output.unwrap_or(Value::Null)),
            ResultStatus::Failed | ResultStatus::TimedOut => Err(SdkError::WorkflowFailed(
                response
                    .error
                    .unwrap_or_else(|| "workflow failed without an error message".to_string()),
            )),
            ResultStatus::Running => Err(SdkError::StillRunning(workflow_id.to_string())),
        }
    }

    async fn poll_task(&self, task_queue: &str, wait: Duration) -> Result<Option<PolledTask>> {
        let body = PollRequest {
            identity: &self.identity,
            wait_ms: millis(wait),
        };
        let request = self
            .client
            .post(self.url(&format!("/task-queues/{}/poll", encode(task_queue))))
            .json(&body);

        let response: PollResponse = self.send(request, wait).await?.json().await?;
        Ok(response.task)
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
        let timeout_ms = millis(options.start_to_close_timeout);
        let body = ScheduleActivityRequest {
            activity_type,
            task_queue,
            input,
            start_to_close_timeout_ms: timeout_ms,
        };
        let request = self
            .client
            .post(self.url(&format!(
                "/workflows/{}/runs/{}/activities",
                encode(&execution.id),
                encode(&execution.run_id)
            )))
            .json(&body);

        let response: ScheduleActivityResponse =
            self.send(request, Duration::ZERO).await?.json().await?;
        if let Some(accepted) = response.activity_type.as_deref()
            && accepted != activity_type
        {
            return Err(SdkError::UnexpectedResponse(format!(
                "engine scheduled {} instead of {}",
                accepted, activity_type
            )));
        }

        lock_scheduled(&self.scheduled).insert(
            response.activity_id.clone(),
            (activity_type.to_string(), timeout_ms),
        );
        Ok(response.activity_id)
    }

    /// Waits up to the request timeout per round trip and re-polls while the
    /// engine reports the activity as running.
    #[instrument(skip(self))]
    async fn activity_result(&self, activity_id: &str) -> Result<Value> {
        let url = self.url(&format!("/activities/{}/result", encode(activity_id)));
        let wait = self.request_timeout;
        let entry = ScheduledEntry {
            scheduled: &self.scheduled,
            activity_id,
        };

        let response = loop {
            let request = self
                .client
                .get(&url)
                .query(&[("timeoutMs", millis(wait).to_string())]);
            let response: ResultResponse = self.send(request, wait).await?.json().await?;
            if response.status != ResultStatus::Running {
                break response;
            }
        };

        let (activity, timeout_ms) = entry
            .take()
            .unwrap_or_else(|| (activity_id.to_string(), 0));

        match response.status {
            ResultStatus::Completed => Ok(response.output.unwrap_or(Value::Null)),
            ResultStatus::TimedOut => Err(SdkError::ActivityTimeout {
                activity,
                timeout_ms,
            }),
            _ => Err(SdkError::ActivityFailed {
                activity,
                message: response.error.unwrap_or_default(),
            }),
        }
    }

    #[instrument(skip(self, outcome), fields(completed = outcome.is_completed()))]
    async fn complete_task(&self, task_token: &str, outcome: TaskOutcome) -> Result<()> {
        let token = encode(task_token);
        let request = match outcome {
            TaskOutcome::Completed(output) => self
                .client
                .post(self.url(&format!("/tasks/{}/complete", token)))
                .json(&serde_json::json!({ "output": output })),
            TaskOutcome::Failed(error) => self
                .client
                .post(self.url(&format!("/tasks/{}/fail", token)))
                .json(&serde_json::json!({ "error": error })),
        };

        match self.send(request, Duration::ZERO).await {
            Ok(_) => Ok(()),
            Err(SdkError::WorkflowNotFound(_)) => Err(SdkError::TaskNotFound(task_token.to_string())),
            Err(e) => Err(e),
        }
    }
}

type ScheduledMap = Mutex<HashMap<String, (String, u64)>>;

fn lock_scheduled(
    scheduled: &ScheduledMap,
) -> std::sync::MutexGuard<'_, HashMap<String, (String, u64)>> {
    scheduled.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forgets a scheduled activity once its result wait ends, however it ends.
struct ScheduledEntry<'a> {
    scheduled: &'a ScheduledMap,
    activity_id: &'a str,
}

impl ScheduledEntry<'_> {
    fn take(&self) -> Option<(String, u64)> {
        lock_scheduled(self.scheduled).remove(self.activity_id)
    }
}

impl Drop for ScheduledEntry<'_> {
    fn drop(&mut self) {
        self.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_config() {
        let config = SdkConfig::new().with_engine_addr("engine:7233");
        let engine = HttpEngine::new(&config).unwrap();
        assert_eq!(engine.base_url(), "http://engine:7233/api/v1");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(encode("hello-workflow-1"), "hello-workflow-1");
        assert_eq!(encode("queue name"), "queue%20name");
        assert_eq!(encode("a/b"), "a%2Fb");
    }

    #[test]
    fn test_scheduled_entry_is_forgotten_on_drop() {
        let scheduled: ScheduledMap = Mutex::new(HashMap::new());
        lock_scheduled(&scheduled).insert("act-1".to_string(), ("Greet".to_string(), 500));
        lock_scheduled(&scheduled).insert("act-2".to_string(), ("Greet".to_string(), 500));

        {
            let _entry = ScheduledEntry {
                scheduled: &scheduled,
                activity_id: "act-1",
            };
        }
        let entry = ScheduledEntry {
            scheduled: &scheduled,
            activity_id: "act-2",
        };
        assert_eq!(entry.take(), Some(("Greet".to_string(), 500)));
        drop(entry);

        assert!(lock_scheduled(&scheduled).is_empty());
    }

    #[tokio::test]
    async fn test_failed_result_wait_forgets_activity() {
        let config = SdkConfig::new().with_engine_addr("127.0.0.1:1");
        let engine = HttpEngine::new(&config).unwrap();
        lock_scheduled(&engine.scheduled).insert("act-9".to_string(), ("Greet".to_string(), 500));

        let err = engine.activity_result("act-9").await.unwrap_err();
        assert!(!matches!(err, SdkError::ActivityTimeout { .. }));
        assert!(lock_scheduled(&engine.scheduled).is_empty());
    }
}
