// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kairos Server - HTTP trigger API.
//!
//! In `remote` mode (default) the server connects to the engine and workers run
//! as separate `kairos-worker` processes. In `embedded` mode it runs an
//! in-memory engine and a hello worker in-process.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use kairos_sdk::{CancellationToken, DurableClient, EmbeddedEngine, Worker, WorkerOptions};
use kairos_server::{AppState, Config, EngineMode, build_router};
use kairos_worker::hello_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kairos_server=info,kairos_sdk=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_port = config.http_port,
        engine_mode = %config.engine_mode,
        engine_addr = %config.sdk.engine_addr,
        task_queue = %config.sdk.task_queue,
        "Starting Kairos server"
    );

    let worker_cancel = CancellationToken::new();
    let (client, embedded_worker) = match config.engine_mode {
        EngineMode::Remote => match DurableClient::connect(&config.sdk).await {
            Ok(client) => (client, None),
            Err(e) => {
                error!(error = %e, "Unable to create engine client");
                return Err(e.into());
            }
        },
        EngineMode::Embedded => {
            let engine = Arc::new(EmbeddedEngine::new());
            let worker = Worker::new(
                engine.clone(),
                hello_registry()?,
                WorkerOptions::from_config(&config.sdk),
            );
            let handle = spawn_worker(worker, worker_cancel.clone());
            let client =
                DurableClient::with_backend(engine).with_status_wait(config.sdk.status_wait);
            (client, Some(handle))
        }
    };

    let client = Arc::new(client);
    let app = build_router(AppState::new(client.clone(), &config.sdk.task_queue));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "Kairos server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = embedded_worker {
        worker_cancel.cancel();
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Embedded worker stopped with error"),
            Err(e) => warn!(error = %e, "Embedded worker task failed"),
        }
    }
    client.close().await;

    info!("Kairos server shut down");
    Ok(())
}

fn spawn_worker(worker: Worker, cancel: CancellationToken) -> JoinHandle<kairos_sdk::Result<()>> {
    tokio::spawn(async move { worker.run(cancel).await })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
