use serde::{Deserialize, Serialize};
use serde_json::json;

/// Furthest step a workflow has completed, in causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum WorkflowStep {
    #[default]
    None,
    IssueFetched,
    BranchCreated,
    CommitCreated,
    PrCreated,
}

/// A function call proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call id (tool_use id); may be empty.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl FunctionCall {
    pub fn new(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            arguments,
        }
    }

    pub fn with_result(self, result: CallOutcome) -> FunctionCallRecord {
        FunctionCallRecord { call: self, result }
    }
}

/// Result of running one function call through the enforcer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success(serde_json::Value),
    /// Refused locally: ordering violation, unknown function or bad arguments.
    Rejected { error: String },
    /// The remote operation itself failed; the error is passed through verbatim.
    Failed { error: String },
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Rejected { error } | CallOutcome::Failed { error } => Some(error),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CallOutcome::Success(data) => json!({ "success": true, "data": data }),
            CallOutcome::Rejected { error } => json!({ "success": false, "error": error }),
            CallOutcome::Failed { error } => {
                json!({ "success": false, "error": error, "adapter_failure": true })
            }
        }
    }
}

/// A function call with its result attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallRecord {
    pub call: FunctionCall,
    pub result: CallOutcome,
}

impl FunctionCallRecord {
    /// One-line rendering used in chat replies and conversation history.
    pub fn summary(&self) -> String {
        match &self.result {
            CallOutcome::Success(data) => format!("✅ {}: {}", self.call.name, data),
            CallOutcome::Rejected { error } => format!("⚠️ {}: {}", self.call.name, error),
            CallOutcome::Failed { error } => format!("❌ {} failed: {}", self.call.name, error),
        }
    }
}
