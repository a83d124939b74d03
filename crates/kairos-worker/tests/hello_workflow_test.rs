// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests of the hello workflow on the embedded engine.

use std::sync::Arc;
use std::time::Duration;

use kairos_sdk::{
    ActivityContext, CancellationToken, DurableClient, EmbeddedEngine, Registry, SdkConfig,
    StartWorkflowOptions, WorkUnitInput, WorkUnitStatus, Worker, WorkerOptions,
};
use kairos_worker::{HELLO_WORKFLOW, SAY_HELLO_ACTIVITY, hello_registry, hello_workflow};
use tokio::task::JoinHandle;

const QUEUE: &str = "hello-world-task-queue";

fn worker_options() -> WorkerOptions {
    WorkerOptions::from_config(
        &SdkConfig::new()
            .with_task_queue(QUEUE)
            .with_poll_timeout(Duration::from_millis(50)),
    )
    .with_shutdown_grace(Duration::from_millis(100))
}

fn spawn_worker(
    engine: &Arc<EmbeddedEngine>,
    registry: Registry,
) -> (CancellationToken, JoinHandle<kairos_sdk::Result<()>>) {
    let worker = Worker::new(engine.clone(), registry, worker_options());
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };
    (cancel, handle)
}

fn client(engine: &Arc<EmbeddedEngine>) -> DurableClient {
    DurableClient::with_backend(engine.clone()).with_status_wait(Duration::from_secs(5))
}

async fn trigger(client: &DurableClient, id: &str, name: &str) -> kairos_sdk::WorkUnitHandle {
    client
        .start(
            StartWorkflowOptions::new(id, QUEUE),
            HELLO_WORKFLOW,
            &WorkUnitInput {
                name: name.to_string(),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_hello_workflow_greets_by_name() {
    let engine = Arc::new(EmbeddedEngine::new());
    let (cancel, worker) = spawn_worker(&engine, hello_registry().unwrap());
    let client = client(&engine);

    let handle = trigger(&client, "hello-workflow-ada", "Ada").await;
    let view = client.query_work_unit(&handle.id, &handle.run_id).await;

    assert_eq!(view.status, WorkUnitStatus::Completed);
    assert_eq!(view.workflow_id, "hello-workflow-ada");
    assert_eq!(view.run_id, handle.run_id);
    assert_eq!(
        view.result.unwrap().message,
        "Hello, Ada! Welcome to Temporal."
    );
    assert!(view.error.is_none());

    cancel.cancel();
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failing_activity_fails_workflow() {
    let mut registry = Registry::new();
    registry
        .register_activity(SAY_HELLO_ACTIVITY, |_ctx: ActivityContext, name: String| async move {
            Err::<String, _>(anyhow::anyhow!("cannot greet {}", name))
        })
        .unwrap();
    registry.register_workflow(HELLO_WORKFLOW, hello_workflow).unwrap();

    let engine = Arc::new(EmbeddedEngine::new());
    let (cancel, worker) = spawn_worker(&engine, registry);
    let client = client(&engine);

    let handle = trigger(&client, "hello-workflow-fail", "Bob").await;
    let view = client.query_work_unit(&handle.id, &handle.run_id).await;

    assert_eq!(view.status, WorkUnitStatus::FailedOrRunning);
    assert!(view.result.is_none());
    assert!(view.error.unwrap().contains("cannot greet Bob"));

    cancel.cancel();
    worker.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_activity_times_out_after_ten_seconds() {
    let mut registry = Registry::new();
    registry
        .register_activity(SAY_HELLO_ACTIVITY, |_ctx: ActivityContext, _name: String| async move {
            std::future::pending::<()>().await;
            Ok::<_, anyhow::Error>(String::new())
        })
        .unwrap();
    registry.register_workflow(HELLO_WORKFLOW, hello_workflow).unwrap();

    let engine = Arc::new(EmbeddedEngine::new());
    let (cancel, worker) = spawn_worker(&engine, registry);
    // No status wait: poll until the workflow is terminal.
    let client = DurableClient::with_backend(engine.clone());

    let started = tokio::time::Instant::now();
    let handle = trigger(&client, "hello-workflow-slow", "Eve").await;

    let view = loop {
        let view = client.query_work_unit(&handle.id, &handle.run_id).await;
        if view
            .error
            .as_deref()
            .is_some_and(|e| !e.contains("still running"))
        {
            break view;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(view.status, WorkUnitStatus::FailedOrRunning);
    assert!(view.error.unwrap().contains("timed out after 10000ms"));

    cancel.cancel();
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_two_runs_are_independent() {
    let engine = Arc::new(EmbeddedEngine::new());
    let (cancel, worker) = spawn_worker(&engine, hello_registry().unwrap());
    let client = client(&engine);

    let first = trigger(&client, "hello-workflow-1", "Ada").await;
    let second = trigger(&client, "hello-workflow-2", "Grace").await;

    let first_view = client.query_work_unit(&first.id, &first.run_id).await;
    let second_view = client.query_work_unit(&second.id, &second.run_id).await;

    assert_eq!(first_view.result.unwrap().message, "Hello, Ada! Welcome to Temporal.");
    assert_eq!(
        second_view.result.unwrap().message,
        "Hello, Grace! Welcome to Temporal."
    );

    cancel.cancel();
    worker.await.unwrap().unwrap();
}
