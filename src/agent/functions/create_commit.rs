use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{
    str_arg, Function, FunctionError, FunctionResult, FunctionSchema, CREATE_COMMIT,
};
use crate::platform::types::{CreateCommit, FileChange};
use crate::platform::GitHubOperations;

pub struct CreateCommitFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl CreateCommitFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Function for CreateCommitFunction {
    fn name(&self) -> &str {
        CREATE_COMMIT
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: CREATE_COMMIT.to_string(),
            description: "Commit file contents to an existing branch. The branch must have been created with createBranch first.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Commit message"
                    },
                    "branch": {
                        "type": "string",
                        "description": "Branch to commit to"
                    },
                    "files": {
                        "type": "array",
                        "description": "Files to write, each with the full new content",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": { "type": "string" },
                                "content": { "type": "string" }
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["message", "branch", "files"]
            }),
        }
    }

    async fn call(&self, _caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
        let message = str_arg(CREATE_COMMIT, arguments, "message")?;
        let branch = str_arg(CREATE_COMMIT, arguments, "branch")?.trim();
        let files: Vec<FileChange> = serde_json::from_value(arguments["files"].clone())
            .map_err(|e| FunctionError::invalid(CREATE_COMMIT, format!("'files': {e}")))?;

        if files.is_empty() {
            return Err(FunctionError::invalid(
                CREATE_COMMIT,
                "'files' must contain at least one file",
            ));
        }

        let commit = CreateCommit {
            message: message.to_string(),
            files,
            branch: branch.to_string(),
        };
        let info = self.platform.create_commit(&commit).await?;

        Ok(json!({
            "branch": branch,
            "sha": info.sha,
            "files": commit.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
        }))
    }
}
