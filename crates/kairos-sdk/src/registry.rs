// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registry of workflow and activity functions.
//!
//! A worker only executes functions that were registered by name before it
//! started. Functions are typed at registration time and stored type-erased,
//! taking and returning JSON values.
//!
//! # Example
//!
//! ```ignore
//! use kairos_sdk::{ActivityContext, Registry, WorkflowContext};
//!
//! async fn greet(_ctx: ActivityContext, name: String) -> anyhow::Result<String> {
//!     Ok(format!("Hello, {}", name))
//! }
//!
//! let mut registry = Registry::new();
//! registry.register_activity("Greet", greet)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::{ActivityContext, WorkflowContext};
use crate::error::{Result, SdkError};
use crate::types::TaskKind;

/// Type-erased activity function.
pub type ActivityFn =
    Arc<dyn Fn(ActivityContext, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Type-erased workflow function.
pub type WorkflowFn =
    Arc<dyn Fn(WorkflowContext, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A registered function, tagged with its kind.
#[derive(Clone)]
pub enum Handler {
    Activity(ActivityFn),
    Workflow(WorkflowFn),
}

impl Handler {
    pub fn kind(&self) -> TaskKind {
        match self {
            Handler::Activity(_) => TaskKind::Activity,
            Handler::Workflow(_) => TaskKind::Workflow,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.kind())
    }
}

fn decode<I: DeserializeOwned>(input: Value) -> anyhow::Result<I> {
    serde_json::from_value(input).map_err(|e| anyhow::anyhow!("invalid input: {}", e))
}

fn encode<O: Serialize>(output: O) -> anyhow::Result<Value> {
    serde_json::to_value(output).map_err(|e| anyhow::anyhow!("invalid output: {}", e))
}

/// Name to function mapping consulted by the worker for every task.
#[derive(Default, Clone)]
pub struct Registry {
    handlers: HashMap<(TaskKind, String), Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activity function under `name`.
    ///
    /// Registering the same name twice replaces the earlier function.
    pub fn register_activity<I, O, F, Fut>(&mut self, name: &str, function: F) -> Result<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(ActivityContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let function = Arc::new(function);
        let handler: ActivityFn = Arc::new(move |ctx, input| {
            let function = function.clone();
            async move {
                let input = decode::<I>(input)?;
                encode(function(ctx, input).await?)
            }
            .boxed()
        });

        self.insert(name, Handler::Activity(handler))
    }

    /// Register a workflow function under `name`.
    ///
    /// Registering the same name twice replaces the earlier function.
    pub fn register_workflow<I, O, F, Fut>(&mut self, name: &str, function: F) -> Result<()>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(WorkflowContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let function = Arc::new(function);
        let handler: WorkflowFn = Arc::new(move |ctx, input| {
            let function = function.clone();
            async move {
                let input = decode::<I>(input)?;
                encode(function(ctx, input).await?)
            }
            .boxed()
        });

        self.insert(name, Handler::Workflow(handler))
    }

    fn insert(&mut self, name: &str, handler: Handler) -> Result<()> {
        let kind = handler.kind();
        if name.trim().is_empty() {
            return Err(SdkError::Registration(format!("{} name must not be empty", kind)));
        }

        if self
            .handlers
            .insert((kind, name.to_string()), handler)
            .is_some()
        {
            warn!(kind = %kind, name = %name, "Replacing previously registered function");
        } else {
            debug!(kind = %kind, name = %name, "Registered function");
        }
        Ok(())
    }

    /// Look up the function registered for `kind` and `name`.
    pub fn resolve(&self, kind: TaskKind, name: &str) -> Result<Handler> {
        self.handlers
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| SdkError::Unregistered {
                kind,
                name: name.to_string(),
            })
    }

    /// Registered names of the given kind, sorted.
    pub fn names(&self, kind: TaskKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("workflows", &self.names(TaskKind::Workflow))
            .field("activities", &self.names(TaskKind::Activity))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PolledTask, WorkUnitHandle};
    use chrono::Utc;
    use serde_json::json;

    fn activity_context() -> ActivityContext {
        let task = PolledTask {
            task_token: "t".to_string(),
            kind: TaskKind::Activity,
            name: "Echo".to_string(),
            input: json!(null),
            workflow_id: "wf".to_string(),
            run_id: "run".to_string(),
            activity_id: Some("act-1".to_string()),
            start_to_close_timeout_ms: Some(1000),
            scheduled_at: Utc::now(),
        };
        ActivityContext::new(&task)
    }

    async fn echo(_ctx: ActivityContext, input: String) -> anyhow::Result<String> {
        Ok(format!("echo {}", input))
    }

    #[tokio::test]
    async fn test_registered_activity_runs_with_json() {
        let mut registry = Registry::new();
        registry.register_activity("Echo", echo).unwrap();

        let Handler::Activity(function) = registry.resolve(TaskKind::Activity, "Echo").unwrap()
        else {
            panic!("expected an activity handler");
        };
        let ctx = activity_context();
        assert_eq!(ctx.activity_id(), "act-1");
        assert_eq!(ctx.execution(), &WorkUnitHandle::new("wf", "run"));

        let output = function(ctx, json!("hi")).await.unwrap();
        assert_eq!(output, json!("echo hi"));
    }

    #[tokio::test]
    async fn test_bad_input_is_a_function_error() {
        let mut registry = Registry::new();
        registry.register_activity("Echo", echo).unwrap();

        let Handler::Activity(function) = registry.resolve(TaskKind::Activity, "Echo").unwrap()
        else {
            panic!("expected an activity handler");
        };
        let err = function(activity_context(), json!({"not": "a string"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid input"));
    }

    #[test]
    fn test_unregistered_name() {
        let registry = Registry::new();
        let err = registry.resolve(TaskKind::Workflow, "Missing").unwrap_err();
        assert_eq!(err.to_string(), "unregistered workflow: Missing");
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut registry = Registry::new();
        registry.register_activity("Echo", echo).unwrap();

        assert!(registry.resolve(TaskKind::Workflow, "Echo").is_err());
        assert_eq!(registry.names(TaskKind::Activity), vec!["Echo".to_string()]);
        assert!(registry.names(TaskKind::Workflow).is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = Registry::new();
        let err = registry.register_activity(" ", echo).unwrap_err();
        assert!(matches!(err, SdkError::Registration(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register_activity("Echo", echo).unwrap();
        registry
            .register_activity("Echo", |_ctx: ActivityContext, input: String| async move {
                Ok::<_, anyhow::Error>(input.to_uppercase())
            })
            .unwrap();
        assert_eq!(registry.len(), 1);

        let Handler::Activity(function) = registry.resolve(TaskKind::Activity, "Echo").unwrap()
        else {
            panic!("expected an activity handler");
        };
        assert_eq!(function(activity_context(), json!("hi")).await.unwrap(), json!("HI"));
    }
}
