use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agent::functions::{Function, FunctionResult, FunctionSchema, RESET_WORKFLOW_STATE};
use crate::workflow::state::WorkflowStateTracker;

/// Clears the caller's workflow state so an unrelated branch/commit/PR run can start.
pub struct ResetWorkflowFunction {
    tracker: Arc<WorkflowStateTracker>,
}

impl ResetWorkflowFunction {
    pub fn new(tracker: Arc<WorkflowStateTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Function for ResetWorkflowFunction {
    fn name(&self) -> &str {
        RESET_WORKFLOW_STATE
    }

    fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: RESET_WORKFLOW_STATE.to_string(),
            description: "Forget the issue and branches tracked for this conversation and start a new workflow.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn call(&self, caller_id: &str, _arguments: &serde_json::Value) -> FunctionResult {
        self.tracker.reset(caller_id);
        Ok(json!({ "reset": true }))
    }
}
