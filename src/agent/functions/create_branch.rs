use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{
    opt_str_arg, str_arg, Function, FunctionError, FunctionResult, FunctionSchema, CREATE_BRANCH,
};
use crate::platform::GitHubOperations;

pub struct CreateBranchFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl CreateBranchFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

/// Reject names git would read as an option, and blank ones.
pub fn validate_branch_name(name: &str) -> Result<(), FunctionError> {
    if name.is_empty() || name.starts_with('-') {
        return Err(FunctionError::invalid(
            CREATE_BRANCH,
            format!("'{name}' is not a valid branch name"),
        ));
    }
    Ok(())
}

#[async_trait]
impl Function for CreateBranchFunction {
    fn name(&self) -> &str {
        CREATE_BRANCH
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: CREATE_BRANCH.to_string(),
            description: "Create a new branch. Must be called before createCommit or createPullRequest on that branch.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Name of the branch to create, e.g. feature/issue-42"
                    },
                    "source": {
                        "type": "string",
                        "description": "Branch to start from. Defaults to the repository's default branch."
                    }
                },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, _caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
        let name = str_arg(CREATE_BRANCH, arguments, "name")?.trim();
        validate_branch_name(name)?;

        let source = match opt_str_arg(arguments, "source") {
            Some(source) => source.to_string(),
            None => self.platform.get_repository().await?.default_branch,
        };

        let created = self.platform.create_branch(name, &source).await?;
        Ok(json!({
            "branch": name,
            "source": source,
            "ref": created.ref_name,
            "sha": created.sha,
        }))
    }
}
