//! Claude Code hook payloads

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use super::project_for_cwd;
use crate::model::git::read_branch;
use crate::model::{Event, Session};
use crate::repository::Repositories;

/// JSON a Claude Code hook writes to the command's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookPayload {
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: String,
    pub hook_event_name: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

impl HookPayload {
    pub fn parse(raw: &str) -> Result<Self> {
        let payload: HookPayload =
            serde_json::from_str(raw).context("Failed to parse hook payload")?;
        if payload.session_id.trim().is_empty() {
            bail!("hook payload has an empty session_id");
        }
        Ok(payload)
    }

    /// Correlation id for redelivery detection; only tool hooks carry one.
    pub fn event_uuid(&self) -> Option<String> {
        self.tool_use_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}:{}", self.hook_event_name, id))
    }

    /// Stored event payload: the tool fields that were present.
    pub fn event_payload(&self) -> Value {
        let mut payload = Map::new();
        if let Some(input) = &self.tool_input {
            payload.insert("tool_input".to_string(), input.clone());
        }
        if let Some(response) = &self.tool_response {
            payload.insert("tool_response".to_string(), response.clone());
        }
        if let Some(path) = &self.transcript_path {
            payload.insert("transcript_path".to_string(), Value::String(path.clone()));
        }
        Value::Object(payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Recorded(Event),
    /// Same hook event delivered twice
    AlreadyRecorded,
}

/// Store one hook invocation as an event of its session.
pub async fn record_hook(
    repos: &Repositories,
    payload: &HookPayload,
    now: DateTime<Utc>,
) -> Result<HookOutcome> {
    let project = project_for_cwd(repos, &payload.cwd).await?;

    let mut template = Session::new(payload.session_id.as_str())
        .with_project(project.id.as_str())
        .with_cwd(payload.cwd.as_str())
        .started(now);
    template.created_at = now;
    if let Some(branch) = read_branch(Path::new(&payload.cwd)) {
        template = template.with_branch(branch);
    }
    let session = repos
        .deadline(repos.sessions.find_or_create_by_claude_session_id(template))
        .await?;

    let mut event = Event::new(
        session.id.as_str(),
        payload.hook_event_name.as_str(),
        payload.tool_name.clone().unwrap_or_default(),
        payload.event_payload(),
    )
    .at(now);
    event.uuid = payload.event_uuid();

    match repos.deadline(repos.events.create(event)).await {
        Ok(event) => {
            debug!(session = %session.id, event = %event.id, kind = %event.event_type, "hook recorded");
            Ok(HookOutcome::Recorded(event))
        }
        Err(err) if err.is_duplicate() => {
            info!(session = %session.id, uuid = ?payload.event_uuid(), "hook already recorded");
            Ok(HookOutcome::AlreadyRecorded)
        }
        Err(err) => Err(err.into()),
    }
}
