// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kairos Worker - runs the hello workflow against a remote engine.

use tracing::{error, info, warn};

use kairos_sdk::{CancellationToken, SdkConfig, Worker};
use kairos_worker::hello_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kairos_worker=info,kairos_sdk=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = SdkConfig::from_env()?;

    info!(
        engine_addr = %config.engine_addr,
        task_queue = %config.task_queue,
        identity = %config.worker_identity,
        "Starting Kairos worker"
    );

    let worker = match Worker::connect(&config, hello_registry()?).await {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = %e, "Unable to create worker");
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            cancel.cancel();
        });
    }

    let result = worker.run(cancel).await;
    worker.backend().close().await;

    if let Err(e) = result {
        error!(error = %e, "Unable to start worker");
        return Err(e.into());
    }

    info!("Kairos worker shut down");
    Ok(())
}
