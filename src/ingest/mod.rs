//! Ingestion of Claude Code activity
//!
//! Hook payloads arrive one at a time on stdin; transcripts are JSONL files
//! under the Claude projects directory. Both resolve their project from the
//! working directory's `origin` remote and go through the repository
//! contracts only.

pub mod hook;
pub mod transcript;

pub use hook::{record_hook, HookOutcome, HookPayload};
pub use transcript::{discover, import_all, import_transcript, parse_transcript, ImportSummary, Transcript};

use std::path::Path;

use crate::error::StoreResult;
use crate::model::git::read_origin_remote;
use crate::model::Project;
use crate::repository::Repositories;

/// Project of a working directory; the default project when it has no `origin`.
pub(crate) async fn project_for_cwd(repos: &Repositories, cwd: &str) -> StoreResult<Project> {
    let remote = match cwd {
        "" => None,
        dir => read_origin_remote(Path::new(dir)),
    };
    let remote = remote.unwrap_or_default();
    repos
        .deadline(repos.projects.find_or_create_by_canonical_git_repository(&remote))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::BackendKind;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_cwd_without_repository_uses_default_project() {
        let repos = Repositories::from_store(BackendKind::Memory, MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let project = project_for_cwd(&repos, dir.path().to_str().unwrap()).await.unwrap();
        assert!(project.is_default());
        assert!(project_for_cwd(&repos, "").await.unwrap().is_default());
    }

    #[tokio::test]
    async fn test_cwd_with_origin_gets_its_project() {
        let repos = Repositories::from_store(BackendKind::Memory, MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(
            dir.path().join(".git/config"),
            "[remote \"origin\"]\n\turl = git@github.com:acme/widgets.git\n",
        )
        .unwrap();

        let project = project_for_cwd(&repos, dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(project.canonical_git_url, "github.com/acme/widgets");
    }
}
