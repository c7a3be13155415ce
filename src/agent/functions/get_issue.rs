use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{u64_arg, Function, FunctionResult, FunctionSchema, GET_ISSUE};
use crate::error::AppError;
use crate::platform::GitHubOperations;

pub struct GetIssueFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl GetIssueFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Function for GetIssueFunction {
    fn name(&self) -> &str {
        GET_ISSUE
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: GET_ISSUE.to_string(),
            description: "Fetch a GitHub issue by number. Call this before creating branches, commits or pull requests for the issue.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "number": {
                        "type": "integer",
                        "description": "The issue number"
                    }
                },
                "required": ["number"]
            }),
        }
    }

    async fn call(&self, _caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
        let number = u64_arg(GET_ISSUE, arguments, "number")?;
        let issue = self.platform.get_issue(number).await?;
        Ok(serde_json::to_value(issue).map_err(AppError::from)?)
    }
}
