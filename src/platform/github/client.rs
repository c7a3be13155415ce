use async_trait::async_trait;
use base64::Engine;
use octocrab::Octocrab;
use serde_json::json;

use crate::config::{GitHubAuth, GitHubConfig};
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::GitHubOperations;

use super::auth::{build_client, AppCredentials};
use super::mapper;

enum Credentials {
    Token(Octocrab),
    App(AppCredentials),
}

/// GitHub adapter bound to a single `owner/repo`.
pub struct GitHubPlatform {
    owner: String,
    repo: String,
    base_url: Option<String>,
    credentials: Credentials,
}

impl GitHubPlatform {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let base_url = config.api_base_url.clone();

        let credentials = match config.auth()? {
            GitHubAuth::Token => {
                let token = config.token.clone().unwrap_or_default();
                Credentials::Token(build_client(base_url.as_deref(), token)?)
            }
            GitHubAuth::App {
                app_id,
                private_key_path,
                installation_id,
            } => Credentials::App(AppCredentials::new(
                app_id,
                private_key_path,
                installation_id,
            )?),
        };

        Ok(Self {
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            base_url,
            credentials,
        })
    }

    async fn client(&self) -> Result<Octocrab> {
        match &self.credentials {
            Credentials::Token(client) => Ok(client.clone()),
            Credentials::App(app) => {
                let token = app.installation_token(self.base_url.as_deref()).await?;
                build_client(self.base_url.as_deref(), token)
            }
        }
    }

    fn route(&self, path: &str) -> String {
        format!("/repos/{}/{}/{path}", self.owner, self.repo)
    }

    fn head_ref_route(&self, branch: &str) -> String {
        self.route(&format!("git/ref/heads/{}", encode_branch(branch)))
    }

    async fn head_sha(&self, client: &Octocrab, branch: &str) -> Result<String> {
        let value: serde_json::Value = client
            .get(self.head_ref_route(branch), None::<&()>)
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to resolve branch {branch}: {e}")))?;

        mapper::ref_sha(&value)
    }
}

/// Percent-encode each path segment of a branch name, keeping the `/` separators.
fn encode_branch(branch: &str) -> String {
    branch
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_not_found(error: &octocrab::Error) -> bool {
    matches!(error, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

#[async_trait]
impl GitHubOperations for GitHubPlatform {
    async fn get_repository(&self) -> Result<Repository> {
        let client = self.client().await?;
        let repo = client.repos(&self.owner, &self.repo).get().await?;
        Ok(mapper::map_repository(repo))
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        let client = self.client().await?;
        let issue = client.issues(&self.owner, &self.repo).get(number).await?;
        Ok(mapper::map_issue(issue))
    }

    async fn branch_exists(&self, name: &str) -> Result<bool> {
        let client = self.client().await?;
        let result: std::result::Result<serde_json::Value, _> =
            client.get(self.head_ref_route(name), None::<&()>).await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(AppError::GitHubApi(format!(
                "Failed to check branch {name}: {e}"
            ))),
        }
    }

    async fn create_branch(&self, name: &str, source: &str) -> Result<BranchRef> {
        let client = self.client().await?;
        let sha = self.head_sha(&client, source).await?;

        let created: serde_json::Value = client
            .post(
                self.route("git/refs"),
                Some(&json!({ "ref": format!("refs/heads/{name}"), "sha": sha })),
            )
            .await
            .map_err(|e| AppError::GitHubApi(format!("Failed to create branch {name}: {e}")))?;

        tracing::info!(branch = name, source = source, sha = %sha, "Created branch");
        mapper::map_branch_ref(&created)
    }

    async fn create_commit(&self, commit: &CreateCommit) -> Result<CommitInfo> {
        let client = self.client().await?;
        let parent = self.head_sha(&client, &commit.branch).await?;

        let parent_commit: serde_json::Value = client
            .get(self.route(&format!("git/commits/{parent}")), None::<&()>)
            .await?;
        let base_tree = parent_commit["tree"]["sha"]
            .as_str()
            .ok_or_else(|| AppError::GitHubApi("Parent commit missing tree.sha".to_string()))?
            .to_string();

        let mut entries = Vec::with_capacity(commit.files.len());
        for file in &commit.files {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&file.content);
            let blob: serde_json::Value = client
                .post(
                    self.route("git/blobs"),
                    Some(&json!({ "content": encoded, "encoding": "base64" })),
                )
                .await
                .map_err(|e| {
                    AppError::GitHubApi(format!("Failed to create blob for {}: {e}", file.path))
                })?;

            entries.push(json!({
                "path": file.path,
                "mode": "100644",
                "type": "blob",
                "sha": mapper::object_sha(&blob, "Blob")?,
            }));
        }

        let tree: serde_json::Value = client
            .post(
                self.route("git/trees"),
                Some(&json!({ "base_tree": base_tree, "tree": entries })),
            )
            .await?;
        let tree_sha = mapper::object_sha(&tree, "Tree")?;

        let created: serde_json::Value = client
            .post(
                self.route("git/commits"),
                Some(&json!({
                    "message": commit.message,
                    "tree": tree_sha,
                    "parents": [parent],
                })),
            )
            .await?;
        let sha = mapper::object_sha(&created, "Commit")?;

        let _: serde_json::Value = client
            .patch(
                self.route(&format!("git/refs/heads/{}", encode_branch(&commit.branch))),
                Some(&json!({ "sha": sha, "force": false })),
            )
            .await
            .map_err(|e| {
                AppError::GitHubApi(format!(
                    "Failed to update branch {}: {e}",
                    commit.branch
                ))
            })?;

        tracing::info!(
            branch = %commit.branch,
            files = commit.files.len(),
            sha = %sha,
            "Created commit"
        );

        Ok(CommitInfo { sha })
    }

    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest> {
        let client = self.client().await?;

        let created = client
            .pulls(&self.owner, &self.repo)
            .create(&pr.title, &pr.head, &pr.base)
            .body(&pr.body)
            .send()
            .await?;

        Ok(mapper::map_pull_request(created))
    }
}
