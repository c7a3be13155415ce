pub mod branch_exists;
pub mod create_branch;
pub mod create_commit;
pub mod create_pull_request;
pub mod get_issue;
pub mod get_repository;
pub mod reset_workflow;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;
use crate::platform::GitHubOperations;
use crate::workflow::state::WorkflowStateTracker;

pub const GET_REPOSITORY: &str = "getRepository";
pub const GET_ISSUE: &str = "getIssue";
pub const BRANCH_EXISTS: &str = "branchExists";
pub const CREATE_BRANCH: &str = "createBranch";
pub const CREATE_COMMIT: &str = "createCommit";
pub const CREATE_PULL_REQUEST: &str = "createPullRequest";
pub const RESET_WORKFLOW_STATE: &str = "resetWorkflowState";

/// Declared shape of a callable function, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the arguments.
    pub parameters: serde_json::Value,
}

impl FunctionSchema {
    /// Names listed in the schema's `required` array.
    pub fn required(&self) -> Vec<&str> {
        self.parameters["required"]
            .as_array()
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error(transparent)]
    Handler(#[from] AppError),
}

impl FunctionError {
    pub fn invalid(function: &str, reason: impl Into<String>) -> Self {
        FunctionError::InvalidArguments {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

pub type FunctionResult = std::result::Result<serde_json::Value, FunctionError>;

#[async_trait]
pub trait Function: Send + Sync {
    fn name(&self) -> &str;
    fn schema(&self) -> FunctionSchema;
    /// `caller_id` is the workflow key of the conversation issuing the call.
    async fn call(&self, caller_id: &str, arguments: &serde_json::Value) -> FunctionResult;
}

/// Named functions in registration order.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: Vec<Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the GitHub workflow functions.
    pub fn with_github(
        platform: Arc<dyn GitHubOperations>,
        tracker: Arc<WorkflowStateTracker>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(get_repository::GetRepositoryFunction::new(
            Arc::clone(&platform),
        )));
        registry.register(Arc::new(get_issue::GetIssueFunction::new(Arc::clone(
            &platform,
        ))));
        registry.register(Arc::new(branch_exists::BranchExistsFunction::new(
            Arc::clone(&platform),
        )));
        registry.register(Arc::new(create_branch::CreateBranchFunction::new(
            Arc::clone(&platform),
        )));
        registry.register(Arc::new(create_commit::CreateCommitFunction::new(
            Arc::clone(&platform),
        )));
        registry.register(Arc::new(
            create_pull_request::CreatePullRequestFunction::new(platform),
        ));
        registry.register(Arc::new(reset_workflow::ResetWorkflowFunction::new(
            tracker,
        )));
        registry
    }

    /// Register a function. A function with the same name is replaced in place.
    pub fn register(&mut self, function: Arc<dyn Function>) {
        match self
            .functions
            .iter_mut()
            .find(|existing| existing.name() == function.name())
        {
            Some(slot) => {
                tracing::debug!(function = function.name(), "Replacing registered function");
                *slot = function;
            }
            None => self.functions.push(function),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn schema(&self, name: &str) -> Option<FunctionSchema> {
        self.get(name).map(|f| f.schema())
    }

    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.functions.iter().map(|f| f.schema()).collect()
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Resolve `name`, check required arguments against its schema and invoke it.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        caller_id: &str,
    ) -> FunctionResult {
        let function = self
            .get(name)
            .ok_or_else(|| FunctionError::UnknownFunction(name.to_string()))?;

        validate_arguments(&function.schema(), arguments)?;

        function.call(caller_id, arguments).await
    }
}

fn validate_arguments(
    schema: &FunctionSchema,
    arguments: &serde_json::Value,
) -> std::result::Result<(), FunctionError> {
    let object = arguments
        .as_object()
        .ok_or_else(|| FunctionError::invalid(&schema.name, "arguments must be a JSON object"))?;

    let missing: Vec<&str> = schema
        .required()
        .into_iter()
        .filter(|name| object.get(*name).map_or(true, |v| v.is_null()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FunctionError::invalid(
            &schema.name,
            format!("missing required parameter(s): {}", missing.join(", ")),
        ))
    }
}

/// Read a required string argument.
pub fn str_arg<'a>(
    function: &str,
    arguments: &'a serde_json::Value,
    key: &str,
) -> std::result::Result<&'a str, FunctionError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| FunctionError::invalid(function, format!("'{key}' must be a string")))
}

/// Read an optional string argument; empty strings count as absent.
pub fn opt_str_arg<'a>(arguments: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    arguments[key].as_str().filter(|s| !s.is_empty())
}

/// Read a required non-negative integer, accepting numeric strings and a leading `#`.
pub fn u64_arg(
    function: &str,
    arguments: &serde_json::Value,
    key: &str,
) -> std::result::Result<u64, FunctionError> {
    let value = &arguments[key];
    value
        .as_u64()
        .or_else(|| {
            value
                .as_str()
                .and_then(|s| s.trim().trim_start_matches('#').parse().ok())
        })
        .ok_or_else(|| {
            FunctionError::invalid(function, format!("'{key}' must be a positive integer"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        name: &'static str,
        tag: &'static str,
    }

    #[async_trait]
    impl Function for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn schema(&self) -> FunctionSchema {
            FunctionSchema {
                name: self.name.to_string(),
                description: "Echo the input".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            }
        }

        async fn call(&self, caller_id: &str, arguments: &serde_json::Value) -> FunctionResult {
            Ok(json!({
                "tag": self.tag,
                "caller": caller_id,
                "text": str_arg(self.name, arguments, "text")?,
            }))
        }
    }

    #[tokio::test]
    async fn test_execute_invokes_handler() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Echo { name: "echo", tag: "a" }));

        let result = registry
            .execute("echo", &json!({ "text": "hi" }), "C1:1.0:dev")
            .await
            .unwrap();
        assert_eq!(result["text"], "hi");
        assert_eq!(result["caller"], "C1:1.0:dev");
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.execute("nope", &json!({}), "k").await.unwrap_err();
        assert!(matches!(err, FunctionError::UnknownFunction(ref n) if n == "nope"));
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Echo { name: "echo", tag: "a" }));

        let err = registry
            .execute("echo", &json!({ "text": null }), "k")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing required parameter(s): text"));

        let err = registry.execute("echo", &json!("text"), "k").await.unwrap_err();
        assert!(matches!(err, FunctionError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_reregister_overwrites_in_place() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Echo { name: "first", tag: "old" }));
        registry.register(Arc::new(Echo { name: "second", tag: "x" }));
        registry.register(Arc::new(Echo { name: "first", tag: "new" }));

        let names: Vec<String> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["first", "second"]);

        let result = registry
            .execute("first", &json!({ "text": "t" }), "k")
            .await
            .unwrap();
        assert_eq!(result["tag"], "new");
    }

    #[test]
    fn test_u64_arg_accepts_numeric_strings() {
        assert_eq!(u64_arg("f", &json!({ "n": 42 }), "n").unwrap(), 42);
        assert_eq!(u64_arg("f", &json!({ "n": "#7" }), "n").unwrap(), 7);
        assert!(u64_arg("f", &json!({ "n": -1 }), "n").is_err());
        assert!(u64_arg("f", &json!({ "n": "abc" }), "n").is_err());
    }
}
