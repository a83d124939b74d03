// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kairos SDK - client and worker for an external durable execution engine.
//!
//! The engine owns durability: it stores workflow state, hands tasks to
//! workers over named task queues and records their outcomes. This crate
//! provides the two sides that talk to it:
//!
//! - **[`DurableClient`]**: start a workflow and query its status
//! - **[`Worker`]**: poll a task queue and run registered workflow and
//!   activity functions from a [`Registry`]
//!
//! Both go through an [`EngineBackend`]. [`HttpEngine`] reaches a remote
//! engine over its JSON API; [`EmbeddedEngine`] keeps everything in memory so
//! a client and a worker can share one process in tests and local development.
//!
//! # Quick Start
//!
//! ```ignore
//! use kairos_sdk::{ActivityContext, Registry, SdkConfig, Worker, WorkflowContext};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn say_hello(_ctx: ActivityContext, name: String) -> anyhow::Result<String> {
//!     Ok(format!("Hello, {}!", name))
//! }
//!
//! async fn hello(ctx: WorkflowContext, name: String) -> anyhow::Result<String> {
//!     Ok(ctx.execute_activity("SayHello", &name).await?)
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut registry = Registry::new();
//!     registry.register_activity("SayHello", say_hello)?;
//!     registry.register_workflow("Hello", hello)?;
//!
//!     let config = SdkConfig::from_env()?;
//!     let worker = Worker::connect(&config, registry).await?;
//!     worker.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Status queries
//!
//! [`DurableClient::query_status`] never fails. An execution that has not
//! completed is reported as `failed-or-running` whether it is still in flight
//! or has failed; the `error` field carries the engine's explanation.

pub mod backend;
mod client;
mod config;
mod context;
mod error;
mod registry;
mod types;
mod worker;

pub use backend::EngineBackend;
pub use backend::embedded::EmbeddedEngine;
pub use backend::http::HttpEngine;
pub use client::DurableClient;
pub use config::SdkConfig;
pub use context::{ActivityContext, WorkflowContext};
pub use error::{Result, SdkError};
pub use registry::{ActivityFn, Handler, Registry, WorkflowFn};
pub use types::{
    ActivityOptions, PolledTask, StartWorkflowOptions, TaskKind, TaskOutcome, WorkUnitHandle,
    WorkUnitInput, WorkUnitOutput, WorkUnitStatus, WorkUnitStatusView,
};
pub use worker::{Worker, WorkerOptions};

// Re-exported so callers can build the token `Worker::run` expects.
pub use tokio_util::sync::CancellationToken;
