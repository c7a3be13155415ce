use crate::error::{AppError, Result};
use crate::platform::types;

/// Map an octocrab repository to our platform type.
pub fn map_repository(repo: octocrab::models::Repository) -> types::Repository {
    types::Repository {
        full_name: repo.full_name.unwrap_or(repo.name),
        default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
        description: repo.description,
        url: repo.html_url.map(|u| u.to_string()),
    }
}

pub fn map_issue(issue: octocrab::models::issues::Issue) -> types::Issue {
    let state = match issue.state {
        octocrab::models::IssueState::Open => "open",
        octocrab::models::IssueState::Closed => "closed",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    };

    types::Issue {
        number: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        state: state.to_string(),
    }
}

pub fn map_pull_request(pr: octocrab::models::pulls::PullRequest) -> types::PullRequest {
    types::PullRequest {
        number: pr.number,
        url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
    }
}

/// Extract `object.sha` from a git ref response.
pub fn ref_sha(value: &serde_json::Value) -> Result<String> {
    value["object"]["sha"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::GitHubApi("Ref response missing object.sha".to_string()))
}

/// Extract a top-level `sha` from a blob, tree or commit response.
pub fn object_sha(value: &serde_json::Value, kind: &str) -> Result<String> {
    value["sha"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::GitHubApi(format!("{kind} response missing sha")))
}

pub fn map_branch_ref(value: &serde_json::Value) -> Result<types::BranchRef> {
    let ref_name = value["ref"]
        .as_str()
        .ok_or_else(|| AppError::GitHubApi("Ref response missing ref".to_string()))?
        .to_string();

    Ok(types::BranchRef {
        ref_name,
        sha: ref_sha(value)?,
    })
}
