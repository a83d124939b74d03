// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use thiserror::Error;

use crate::types::TaskKind;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine could not be reached
    #[error("connection error: {0}")]
    Connection(String),

    /// The engine rejected a workflow submission
    #[error("failed to start workflow: {0}")]
    Start(String),

    /// A workflow or activity could not be registered
    #[error("registration failed: {0}")]
    Registration(String),

    /// A task named a function that is not in the registry
    #[error("unregistered {kind}: {name}")]
    Unregistered {
        /// Kind of function that was looked up
        kind: TaskKind,
        /// Name that was looked up
        name: String,
    },

    /// No execution exists for the given workflow id (and run id, if any)
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A non-terminal execution with this workflow id already exists
    #[error("workflow execution already started: {0}")]
    AlreadyStarted(String),

    /// The execution has not reached a terminal state yet
    #[error("workflow execution still running: {0}")]
    StillRunning(String),

    /// The execution finished with an error
    #[error("workflow execution failed: {0}")]
    WorkflowFailed(String),

    /// An activity returned an error
    #[error("activity {activity} failed: {message}")]
    ActivityFailed {
        /// Activity type name
        activity: String,
        /// Error reported by the activity
        message: String,
    },

    /// An activity did not finish within its start-to-close timeout
    #[error("activity {activity} timed out after {timeout_ms}ms (start-to-close)")]
    ActivityTimeout {
        /// Activity type name
        activity: String,
        /// Configured start-to-close timeout
        timeout_ms: u64,
    },

    /// The engine has no in-flight task for this token
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Worker loop failed and cannot continue
    #[error("worker runtime error: {0}")]
    Runtime(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Request timed out
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// Server returned an error response
    #[error("server error [{code}]: {message}")]
    Server {
        /// Error code from the engine
        code: String,
        /// Error message from the engine
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unexpected response from the engine
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            SdkError::Connection(err.to_string())
        } else if err.is_decode() {
            SdkError::Serialization(err.to_string())
        } else {
            SdkError::UnexpectedResponse(err.to_string())
        }
    }
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
