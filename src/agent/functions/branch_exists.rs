use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{str_arg, Function, FunctionResult, FunctionSchema, BRANCH_EXISTS};
use crate::platform::GitHubOperations;

pub struct BranchExistsFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl BranchExistsFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Function for BranchExistsFunction {
    fn name(&self) -> &str {
        BRANCH_EXISTS
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: BRANCH_EXISTS.to_string(),
            description: "Check whether a branch exists in the repository.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Branch name without the refs/heads/ prefix"
                    }
                },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, _caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
        let name = str_arg(BRANCH_EXISTS, arguments, "name")?;
        let exists = self.platform.branch_exists(name).await?;
        Ok(json!({ "name": name, "exists": exists }))
    }
}
