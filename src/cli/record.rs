//! Hook entry point: `agentledger record < payload.json`

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Read;

use crate::ingest::{record_hook, HookOutcome, HookPayload};
use crate::repository::Repositories;

/// Stdout stays empty so the agent does not read the output as a hook decision.
pub async fn run(repos: &Repositories) -> Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("Failed to read hook payload from stdin")?;
    let payload = HookPayload::parse(&raw)?;

    match record_hook(repos, &payload, Utc::now()).await? {
        HookOutcome::Recorded(event) => {
            tracing::info!(event = %event.id, kind = %event.event_type, "recorded");
        }
        HookOutcome::AlreadyRecorded => {}
    }
    Ok(())
}
