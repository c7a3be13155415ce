use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{Function, FunctionResult, FunctionSchema, GET_REPOSITORY};
use crate::error::AppError;
use crate::platform::GitHubOperations;

pub struct GetRepositoryFunction {
    platform: Arc<dyn GitHubOperations>,
}

impl GetRepositoryFunction {
    pub fn new(platform: Arc<dyn GitHubOperations>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Function for GetRepositoryFunction {
    fn name(&self) -> &str {
        GET_REPOSITORY
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: GET_REPOSITORY.to_string(),
            description: "Get information about the repository, including its default branch."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn call(&self, _caller_id: &str, _arguments: &serde_json::Value) -> FunctionResult {
        let repo = self.platform.get_repository().await?;
        Ok(serde_json::to_value(repo).map_err(AppError::from)?)
    }
}
