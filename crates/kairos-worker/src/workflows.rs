// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflows executed by the hello worker.

use std::time::Duration;

use kairos_sdk::{ActivityOptions, WorkUnitInput, WorkUnitOutput, WorkflowContext};
use tracing::info;

use crate::activities::SAY_HELLO_ACTIVITY;

/// Registered name of [`hello_workflow`].
pub const HELLO_WORKFLOW: &str = "HelloWorkflow";

/// Start-to-close timeout of the greeting activity.
pub const SAY_HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the greeting activity for `input.name` and wrap its result.
///
/// An activity failure, including a timeout, fails the workflow without output.
pub async fn hello_workflow(
    ctx: WorkflowContext,
    input: WorkUnitInput,
) -> anyhow::Result<WorkUnitOutput> {
    info!(workflow_id = %ctx.workflow_id(), name = %input.name, "Hello workflow started");

    let ctx = ctx.with_activity_options(ActivityOptions::start_to_close(SAY_HELLO_TIMEOUT));
    let message: String = ctx.execute_activity(SAY_HELLO_ACTIVITY, &input.name).await?;

    Ok(WorkUnitOutput { message })
}
