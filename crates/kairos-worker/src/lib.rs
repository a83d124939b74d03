// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hello workflow for Kairos.
//!
//! `HelloWorkflow` takes a `{"name": ...}` input, runs `SayHelloActivity` with a
//! 10 second start-to-close timeout and returns `{"message": ...}`. The
//! `kairos-worker` binary registers both and polls the configured task queue.

pub mod activities;
pub mod workflows;

use kairos_sdk::Registry;

pub use activities::{SAY_HELLO_ACTIVITY, say_hello};
pub use workflows::{HELLO_WORKFLOW, hello_workflow};

/// Register the hello workflow and its activity.
pub fn register_hello(registry: &mut Registry) -> kairos_sdk::Result<()> {
    registry.register_activity(SAY_HELLO_ACTIVITY, say_hello)?;
    registry.register_workflow(HELLO_WORKFLOW, hello_workflow)?;
    Ok(())
}

/// A registry holding only the hello workflow and its activity.
pub fn hello_registry() -> kairos_sdk::Result<Registry> {
    let mut registry = Registry::new();
    register_hello(&mut registry)?;
    Ok(registry)
}
