// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Activities executed by the hello worker.

use kairos_sdk::ActivityContext;
use tracing::info;

/// Registered name of [`say_hello`].
pub const SAY_HELLO_ACTIVITY: &str = "SayHelloActivity";

/// Build the greeting for `name`.
pub async fn say_hello(ctx: ActivityContext, name: String) -> anyhow::Result<String> {
    info!(activity_id = %ctx.activity_id(), name = %name, "Saying hello");
    Ok(greeting(&name))
}

pub fn greeting(name: &str) -> String {
    format!("Hello, {}! Welcome to Temporal.", name)
}
