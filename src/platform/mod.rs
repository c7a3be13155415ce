pub mod github;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// Source-control operations the workflow functions are built on.
///
/// Every method talks to the single repository the adapter was configured for.
#[async_trait]
pub trait GitHubOperations: Send + Sync {
    /// Fetch repository metadata (name, default branch).
    async fn get_repository(&self) -> Result<Repository>;

    /// Fetch an issue by number.
    async fn get_issue(&self, number: u64) -> Result<Issue>;

    /// Whether `refs/heads/{name}` exists.
    async fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Create `refs/heads/{name}` pointing at the head of `source`.
    async fn create_branch(&self, name: &str, source: &str) -> Result<BranchRef>;

    /// Commit a set of file contents on top of an existing branch.
    async fn create_commit(&self, commit: &CreateCommit) -> Result<CommitInfo>;

    /// Open a pull request.
    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest>;
}
