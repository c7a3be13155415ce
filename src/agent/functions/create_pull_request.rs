use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{
    opt_str_arg, str_arg, Function, FunctionResult, FunctionSchema, CREATE_PULL_REQUEST,
};
use crate::platform::types::CreatePullRequest;
use crate::platform::GitHubOperations;

pub struct CreatePullRequestFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl CreatePullRequestFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Function for CreatePullRequestFunction {
    fn name(&self) -> &str {
        CREATE_PULL_REQUEST
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: CREATE_PULL_REQUEST.to_string(),
            description: "Open a pull request from a branch that was created with createBranch and has commits from createCommit.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Pull request title"
                    },
                    "body": {
                        "type": "string",
                        "description": "Pull request description; reference the issue with 'Resolves #N'"
                    },
                    "head": {
                        "type": "string",
                        "description": "Branch containing the changes"
                    },
                    "base": {
                        "type": "string",
                        "description": "Branch to merge into. Defaults to the repository's default branch."
                    }
                },
                "required": ["title", "head"]
            }),
        }
    }

    async fn call(&self, _caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
        let title = str_arg(CREATE_PULL_REQUEST, arguments, "title")?;
        let head = str_arg(CREATE_PULL_REQUEST, arguments, "head")?.trim();

        let base = match opt_str_arg(arguments, "base") {
            Some(base) => base.to_string(),
            None => self.platform.get_repository().await?.default_branch,
        };

        let pr = self
            .platform
            .create_pull_request(&CreatePullRequest {
                title: title.to_string(),
                body: opt_str_arg(arguments, "body").unwrap_or_default().to_string(),
                head: head.to_string(),
                base: base.clone(),
            })
            .await?;

        Ok(json!({
            "number": pr.number,
            "url": pr.url,
            "head": head,
            "base": base,
        }))
    }
}
