//! Claude Code transcript import
//!
//! Data format: JSONL files in ~/.claude/projects/<project_hash>/<session_id>.jsonl.
//! Every `tool_use` content block of an assistant message becomes one event
//! whose uuid is the tool use id, so importing a file twice adds nothing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::project_for_cwd;
use crate::model::{Event, Session};
use crate::repository::Repositories;

/// Event type of imported tool uses.
pub const TRANSCRIPT_EVENT_TYPE: &str = "ToolUse";

/// One `tool_use` content block.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: Option<String>,
    pub name: String,
    pub input: Value,
    pub timestamp: Option<DateTime<Utc>>,
}

/// What an import needs from one transcript file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub session_id: String,
    pub path: PathBuf,
    pub cwd: Option<String>,
    pub branch: Option<String>,
    pub title: Option<String>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub tool_uses: Vec<ToolUse>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub sessions: usize,
    pub events: usize,
    /// Tool uses already stored by an earlier import
    pub skipped: usize,
}

impl ImportSummary {
    fn add(&mut self, other: ImportSummary) {
        self.sessions += other.sessions;
        self.events += other.events;
        self.skipped += other.skipped;
    }
}

/// Every `*.jsonl` directly inside a project directory under `base`.
pub fn discover(base: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];

    if !base.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(base).min_depth(2).max_depth(2).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", base.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "jsonl").unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

pub fn parse_transcript(path: &Path) -> Result<Transcript> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open session file {}", path.display()))?;
    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();
    let mut transcript = parse_lines(&session_id, BufReader::new(file))?;
    transcript.path = path.to_path_buf();
    Ok(transcript)
}

fn parse_lines(session_id: &str, reader: impl BufRead) -> Result<Transcript> {
    let mut transcript = Transcript {
        session_id: session_id.to_string(),
        ..Default::default()
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let json: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        // Skip queue operations
        if json.get("type").and_then(|v| v.as_str()) == Some("queue-operation") {
            continue;
        }

        if transcript.cwd.is_none() {
            transcript.cwd = json.get("cwd").and_then(|v| v.as_str()).map(String::from);
        }
        if transcript.branch.is_none() {
            transcript.branch = json
                .get("gitBranch")
                .and_then(|v| v.as_str())
                .filter(|b| !b.is_empty())
                .map(String::from);
        }

        let timestamp = json
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        if let Some(ts) = timestamp {
            if transcript.first_timestamp.is_none() {
                transcript.first_timestamp = Some(ts);
            }
            transcript.last_timestamp = Some(ts);
        }

        let role = json
            .get("message")
            .and_then(|m| m.get("role"))
            .and_then(|v| v.as_str())
            .or_else(|| json.get("type").and_then(|v| v.as_str()))
            .unwrap_or("unknown");

        let content = json.get("message").and_then(|m| m.get("content"));

        // Title from first user message
        if transcript.title.is_none() && role == "user" {
            transcript.title = content.and_then(first_text).map(truncate_title);
        }

        let blocks = content.and_then(|c| c.as_array()).into_iter().flatten();
        for item in blocks {
            if item.get("type").and_then(|t| t.as_str()) != Some("tool_use") {
                continue;
            }
            transcript.tool_uses.push(ToolUse {
                id: item.get("id").and_then(|v| v.as_str()).map(String::from),
                name: item
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                input: item.get("input").cloned().unwrap_or(Value::Null),
                timestamp,
            });
        }
    }

    Ok(transcript)
}

fn first_text(content: &Value) -> Option<&str> {
    if let Some(text) = content.as_str() {
        return Some(text);
    }
    content.as_array()?.iter().find_map(|item| {
        if item.get("type").and_then(|t| t.as_str()) == Some("text") {
            item.get("text").and_then(|t| t.as_str())
        } else {
            None
        }
    })
}

/// Truncate a string to make a reasonable title (first 100 chars, first line)
fn truncate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() > 100 {
        let head: String = first_line.chars().take(97).collect();
        format!("{}...", head)
    } else {
        first_line.to_string()
    }
}

/// Store one parsed transcript. Tool uses seen before are counted as skipped.
pub async fn import_transcript(repos: &Repositories, transcript: &Transcript) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    if transcript.tool_uses.is_empty() && transcript.first_timestamp.is_none() {
        return Ok(summary);
    }

    let cwd = transcript.cwd.clone().unwrap_or_default();
    let project = project_for_cwd(repos, &cwd).await?;
    let started = transcript.first_timestamp.unwrap_or_else(Utc::now);

    let mut template = Session::new(transcript.session_id.as_str())
        .with_project(project.id.as_str())
        .with_cwd(cwd)
        .started(started);
    template.created_at = started;
    if let Some(branch) = &transcript.branch {
        template = template.with_branch(branch.as_str());
    }
    if let Some(title) = &transcript.title {
        template = template.with_title(title.as_str());
    }

    let session = repos
        .deadline(repos.sessions.find_or_create_by_claude_session_id(template))
        .await?;
    summary.sessions = 1;

    if session.title.is_none() && transcript.title.is_some() {
        repos
            .deadline(repos.sessions.update_title(&session.id, transcript.title.clone()))
            .await?;
    }

    for tool_use in &transcript.tool_uses {
        let mut event = Event::new(
            session.id.as_str(),
            TRANSCRIPT_EVENT_TYPE,
            tool_use.name.as_str(),
            tool_use.input.clone(),
        );
        if let Some(at) = tool_use.timestamp.or(transcript.last_timestamp) {
            event = event.at(at);
        }
        event.uuid = tool_use.id.clone();

        match repos.deadline(repos.events.create(event)).await {
            Ok(_) => summary.events += 1,
            Err(err) if err.is_duplicate() => summary.skipped += 1,
            Err(err) => return Err(err.into()),
        }
    }

    debug!(
        session = %session.id,
        events = summary.events,
        skipped = summary.skipped,
        "transcript imported"
    );
    Ok(summary)
}

/// Import every transcript under `base`. Unreadable files are logged and skipped.
pub async fn import_all(repos: &Repositories, base: &Path) -> Result<ImportSummary> {
    let root = base.to_path_buf();
    let files = tokio::task::spawn_blocking(move || discover(&root)).await??;
    info!(base = %base.display(), files = files.len(), "importing transcripts");

    let mut summary = ImportSummary::default();
    for path in files {
        let parse_path = path.clone();
        let transcript = match tokio::task::spawn_blocking(move || parse_transcript(&parse_path)).await? {
            Ok(transcript) => transcript,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping transcript");
                continue;
            }
        };
        summary.add(import_transcript(repos, &transcript).await?);
    }
    Ok(summary)
}
