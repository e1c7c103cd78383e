//! Import command implementation

use anyhow::Result;
use std::path::Path;

use crate::ingest::import_all;
use crate::repository::Repositories;

pub async fn run(repos: &Repositories, base: &Path) -> Result<()> {
    if !base.exists() {
        println!("No transcripts at {}. Check ingest.claude_projects_path.", base.display());
        return Ok(());
    }

    println!("Importing Claude Code transcripts from {}...\n", base.display());
    let summary = import_all(repos, base).await?;

    println!("   Sessions: {}", summary.sessions);
    println!("   Events:   {} new, {} already stored", summary.events, summary.skipped);
    println!("\nImport complete!");
    Ok(())
}
