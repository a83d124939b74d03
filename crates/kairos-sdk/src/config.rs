// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration for connecting to the orchestration engine.

use std::env;
use std::time::Duration;

use crate::error::{Result, SdkError};

const DEFAULT_ENGINE_ADDR: &str = "localhost:7233";
const DEFAULT_TASK_QUEUE: &str = "hello-world-task-queue";

/// SDK configuration shared by the client and the worker.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Engine address as `host:port` (default: "localhost:7233")
    pub engine_addr: String,
    /// Task queue workflows are started on and workers poll (default: "hello-world-task-queue")
    pub task_queue: String,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Request timeout for a single engine call, excluding long-poll waits (default: 30s)
    pub request_timeout: Duration,
    /// How long a status query waits for a result before reporting the
    /// execution as not completed (default: 0, i.e. no wait)
    pub status_wait: Duration,
    /// Long-poll wait for a single task poll (default: 10s)
    pub poll_timeout: Duration,
    /// Maximum number of tasks a worker executes at once (default: 16)
    pub max_concurrent_tasks: usize,
    /// Worker identity reported to the engine
    pub worker_identity: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            engine_addr: DEFAULT_ENGINE_ADDR.to_string(),
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            status_wait: Duration::ZERO,
            poll_timeout: Duration::from_secs(10),
            max_concurrent_tasks: 16,
            worker_identity: default_identity(),
        }
    }
}

impl SdkConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `KAIROS_ENGINE_ADDR` - Engine address (default: "localhost:7233")
    /// - `KAIROS_TASK_QUEUE` - Task queue (default: "hello-world-task-queue")
    /// - `KAIROS_CONNECT_TIMEOUT_MS` - Connection timeout (default: 10000)
    /// - `KAIROS_REQUEST_TIMEOUT_MS` - Request timeout (default: 30000)
    /// - `KAIROS_STATUS_WAIT_MS` - Status query result wait (default: 0)
    /// - `KAIROS_POLL_TIMEOUT_MS` - Worker long-poll wait (default: 10000)
    /// - `KAIROS_MAX_CONCURRENT_TASKS` - Worker concurrency (default: 16)
    /// - `KAIROS_WORKER_IDENTITY` - Worker identity (default: "kairos-worker@<pid>")
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let engine_addr = env::var("KAIROS_ENGINE_ADDR").unwrap_or(defaults.engine_addr);
        if engine_addr.trim().is_empty() {
            return Err(SdkError::Config(
                "KAIROS_ENGINE_ADDR must not be empty".to_string(),
            ));
        }

        let task_queue = env::var("KAIROS_TASK_QUEUE").unwrap_or(defaults.task_queue);
        if task_queue.trim().is_empty() {
            return Err(SdkError::Config(
                "KAIROS_TASK_QUEUE must not be empty".to_string(),
            ));
        }

        let connect_timeout = duration_from_env("KAIROS_CONNECT_TIMEOUT_MS", 10_000)?;
        let request_timeout = duration_from_env("KAIROS_REQUEST_TIMEOUT_MS", 30_000)?;
        let status_wait = duration_from_env("KAIROS_STATUS_WAIT_MS", 0)?;
        let poll_timeout = duration_from_env("KAIROS_POLL_TIMEOUT_MS", 10_000)?;

        let max_concurrent_tasks: usize = env::var("KAIROS_MAX_CONCURRENT_TASKS")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid KAIROS_MAX_CONCURRENT_TASKS: {}", e)))?;
        if max_concurrent_tasks == 0 {
            return Err(SdkError::Config(
                "invalid KAIROS_MAX_CONCURRENT_TASKS: must be at least 1".to_string(),
            ));
        }

        let worker_identity =
            env::var("KAIROS_WORKER_IDENTITY").unwrap_or(defaults.worker_identity);

        Ok(Self {
            engine_addr,
            task_queue,
            connect_timeout,
            request_timeout,
            status_wait,
            poll_timeout,
            max_concurrent_tasks,
            worker_identity,
        })
    }

    /// Set the engine address.
    pub fn with_engine_addr(mut self, addr: impl Into<String>) -> Self {
        self.engine_addr = addr.into();
        self
    }

    /// Set the task queue.
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how long status queries wait for a result.
    pub fn with_status_wait(mut self, wait: Duration) -> Self {
        self.status_wait = wait;
        self
    }

    /// Set the worker long-poll wait.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the worker concurrency limit.
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    /// Set the worker identity.
    pub fn with_worker_identity(mut self, identity: impl Into<String>) -> Self {
        self.worker_identity = identity.into();
        self
    }

    /// Base URL of the engine's HTTP API.
    pub fn engine_url(&self) -> String {
        if self.engine_addr.starts_with("http://") || self.engine_addr.starts_with("https://") {
            self.engine_addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.engine_addr.trim_end_matches('/'))
        }
    }
}

fn duration_from_env(key: &str, default_ms: u64) -> Result<Duration> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| SdkError::Config(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

fn default_identity() -> String {
    format!("kairos-worker@{}", std::process::id())
}
