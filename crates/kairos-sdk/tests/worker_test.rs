// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker tests against the embedded engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use kairos_sdk::{
    ActivityContext, ActivityOptions, CancellationToken, DurableClient, EmbeddedEngine,
    EngineBackend, Registry, SdkConfig, SdkError, StartWorkflowOptions, Worker, WorkerOptions,
    WorkflowContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const QUEUE: &str = "worker-test-queue";

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    item: String,
    quantity: u32,
}

async fn describe(_ctx: ActivityContext, order: Order) -> anyhow::Result<String> {
    Ok(format!("{} x {}", order.quantity, order.item))
}

async fn order_workflow(ctx: WorkflowContext, order: Order) -> anyhow::Result<Value> {
    let summary: String = ctx.execute_activity("Describe", &order).await?;
    Ok(json!({ "summary": summary }))
}

async fn explode(_ctx: ActivityContext, _input: Value) -> anyhow::Result<Value> {
    panic!("activity exploded");
}

async fn explode_workflow(ctx: WorkflowContext, input: Value) -> anyhow::Result<Value> {
    Ok(ctx.execute_activity("Explode", &input).await?)
}

fn options() -> WorkerOptions {
    WorkerOptions::from_config(
        &SdkConfig::new()
            .with_task_queue(QUEUE)
            .with_poll_timeout(Duration::from_millis(50)),
    )
    .with_shutdown_grace(Duration::from_secs(2))
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register_activity("Describe", describe).unwrap();
    registry.register_activity("Explode", explode).unwrap();
    registry.register_workflow("Order", order_workflow).unwrap();
    registry.register_workflow("ExplodeWorkflow", explode_workflow).unwrap();
    registry
}

struct Harness {
    engine: Arc<EmbeddedEngine>,
    client: DurableClient,
    cancel: CancellationToken,
    worker: JoinHandle<kairos_sdk::Result<()>>,
}

impl Harness {
    fn start(options: WorkerOptions) -> Self {
        let engine = Arc::new(EmbeddedEngine::new());
        let client =
            DurableClient::with_backend(engine.clone()).with_status_wait(Duration::from_secs(5));
        let worker = Worker::new(engine.clone(), registry(), options);
        let cancel = CancellationToken::new();
        let worker = {
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.run(cancel).await })
        };
        Self {
            engine,
            client,
            cancel,
            worker,
        }
    }

    async fn run_workflow(
        &self,
        id: &str,
        workflow_type: &str,
        input: Value,
    ) -> (bool, Option<Value>, Option<String>) {
        let handle = self
            .client
            .start(StartWorkflowOptions::new(id, QUEUE), workflow_type, &input)
            .await
            .unwrap();
        let view = self.client.query_status::<Value>(&handle.id, &handle.run_id).await;
        (view.is_completed(), view.result, view.error)
    }

    async fn stop(self) -> kairos_sdk::Result<()> {
        self.cancel.cancel();
        self.worker.await.unwrap()
    }
}

#[tokio::test]
async fn test_workflow_with_activity_completes() {
    let harness = Harness::start(options());

    let (completed, result, error) = harness
        .run_workflow("order-1", "Order", json!({"item": "tea", "quantity": 2}))
        .await;

    assert!(completed, "unexpected error: {:?}", error);
    assert_eq!(result, Some(json!({"summary": "2 x tea"})));
    assert_eq!(harness.engine.workflow_count().await, 1);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_single_slot_worker_runs_workflow_and_activity() {
    let mut single = options();
    single.max_concurrent_tasks = 1;
    let single_slot = Harness::start(single);

    let (completed, result, _) = single_slot
        .run_workflow("order-2", "Order", json!({"item": "cake", "quantity": 1}))
        .await;

    assert!(completed);
    assert_eq!(result, Some(json!({"summary": "1 x cake"})));
    single_slot.stop().await.unwrap();
}

#[tokio::test]
async fn test_unregistered_workflow_fails_execution() {
    let harness = Harness::start(options());

    let (completed, result, error) = harness.run_workflow("nope-1", "Nope", json!({})).await;

    assert!(!completed);
    assert!(result.is_none());
    assert!(error.unwrap().contains("unregistered workflow: Nope"));
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_input_fails_execution() {
    let harness = Harness::start(options());

    let (completed, _, error) = harness
        .run_workflow("order-bad", "Order", json!({"item": "tea"}))
        .await;

    assert!(!completed);
    assert!(error.unwrap().contains("invalid input"));
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_panicking_activity_fails_workflow() {
    let harness = Harness::start(options());

    let (completed, result, error) = harness
        .run_workflow("explode-1", "ExplodeWorkflow", json!(null))
        .await;

    assert!(!completed);
    assert!(result.is_none());
    let error = error.unwrap();
    assert!(error.contains("panicked"), "{}", error);
    assert!(error.contains("activity exploded"), "{}", error);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn test_worker_exits_promptly_on_cancellation() {
    let harness = Harness::start(options().with_shutdown_grace(Duration::from_secs(30)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(1), harness.stop()).await;
    assert!(matches!(stopped, Ok(Ok(()))));
}

#[tokio::test]
async fn test_in_flight_task_finishes_within_grace() {
    let engine = Arc::new(EmbeddedEngine::new());
    let finished = Arc::new(AtomicBool::new(false));

    let mut registry = Registry::new();
    {
        let finished = finished.clone();
        registry
            .register_workflow("Slow", move |_ctx: WorkflowContext, _input: Value| {
                let finished = finished.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(json!("done"))
                }
            })
            .unwrap();
    }

    let worker = Worker::new(engine.clone(), registry, options());
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    engine
        .start_workflow(&StartWorkflowOptions::new("slow-1", QUEUE), "Slow", json!(null))
        .await
        .unwrap();
    // Let the worker pick the task up before shutting down.
    while engine.queue_depth(QUEUE).await > 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    run.await.unwrap().unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(
        engine
            .workflow_result("slow-1", "", Duration::ZERO)
            .await
            .unwrap(),
        json!("done")
    );
}

#[tokio::test]
async fn test_repeated_poll_failures_stop_worker() {
    let engine = Arc::new(EmbeddedEngine::new());
    engine.close().await;

    let worker = Worker::new(
        engine,
        registry(),
        options()
            .with_max_poll_failures(3)
            .with_poll_retry_delay(Duration::from_millis(1)),
    );

    let err = worker.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SdkError::Runtime(ref m) if m.starts_with("3 consecutive poll failures")));
}

#[tokio::test]
async fn test_activity_timeout_fails_workflow() {
    let mut registry = Registry::new();
    registry
        .register_activity("Stall", |_ctx: ActivityContext, _input: Value| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, anyhow::Error>(json!(null))
        })
        .unwrap();
    registry
        .register_workflow("Impatient", |ctx: WorkflowContext, input: Value| async move {
            let ctx = ctx.with_activity_options(ActivityOptions::start_to_close(
                Duration::from_millis(50),
            ));
            let output: Value = ctx.execute_activity("Stall", &input).await?;
            Ok::<_, anyhow::Error>(output)
        })
        .unwrap();

    let engine = Arc::new(EmbeddedEngine::new());
    let client =
        DurableClient::with_backend(engine.clone()).with_status_wait(Duration::from_secs(5));
    let worker = Worker::new(
        engine.clone(),
        registry,
        options().with_shutdown_grace(Duration::from_millis(10)),
    );
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    let handle = client
        .start(StartWorkflowOptions::new("impatient-1", QUEUE), "Impatient", &json!(null))
        .await
        .unwrap();
    let view = client.query_status::<Value>(&handle.id, &handle.run_id).await;

    assert!(!view.is_completed());
    assert!(view.error.unwrap().contains("timed out after 50ms"));

    cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_leaves_waiting_workflow_to_the_engine() {
    let mut registry = Registry::new();
    registry
        .register_activity("Slow", |_ctx: ActivityContext, _input: Value| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok::<_, anyhow::Error>(json!("late"))
        })
        .unwrap();
    registry
        .register_workflow("Waiting", |ctx: WorkflowContext, input: Value| async move {
            let output: Value = ctx.execute_activity("Slow", &input).await?;
            Ok::<_, anyhow::Error>(output)
        })
        .unwrap();

    let engine = Arc::new(EmbeddedEngine::new());
    let worker = Worker::new(
        engine.clone(),
        registry,
        options().with_shutdown_grace(Duration::from_millis(100)),
    );
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { worker.run(cancel).await })
    };

    engine
        .start_workflow(&StartWorkflowOptions::new("waiting-1", QUEUE), "Waiting", json!(null))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    run.await.unwrap().unwrap();

    let err = engine
        .workflow_result("waiting-1", "", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::StillRunning(_)), "{:?}", err);

    // Nothing reports the abandoned tasks later either.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        engine.workflow_result("waiting-1", "", Duration::ZERO).await,
        Err(SdkError::StillRunning(_))
    ));
}
