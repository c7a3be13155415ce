use std::sync::Arc;

use serde_json::json;

use crate::agent::functions::create_branch::validate_branch_name;
use crate::agent::functions::{
    u64_arg, FunctionError, FunctionRegistry, CREATE_BRANCH, CREATE_COMMIT, CREATE_PULL_REQUEST,
    GET_ISSUE,
};
use crate::platform::GitHubOperations;
use crate::workflow::state::WorkflowStateTracker;
use crate::workflow::types::{CallOutcome, FunctionCall, FunctionCallRecord};

const REQUIRED_ORDER: &str = "getIssue → createBranch → createCommit → createPullRequest";

/// Gates GitHub-mutating function calls on the workflow state of their key.
///
/// Calls are evaluated strictly in the order given. A call whose precondition
/// is not met is answered with [`CallOutcome::Rejected`] without touching the
/// adapter; the message names the call that has to come first so the model can
/// correct itself on its next turn.
pub struct WorkflowEnforcer {
    registry: Arc<FunctionRegistry>,
    platform: Arc<dyn GitHubOperations>,
    tracker: Arc<WorkflowStateTracker>,
}

impl WorkflowEnforcer {
    pub fn new(
        registry: Arc<FunctionRegistry>,
        platform: Arc<dyn GitHubOperations>,
        tracker: Arc<WorkflowStateTracker>,
    ) -> Self {
        Self {
            registry,
            platform,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<WorkflowStateTracker> {
        &self.tracker
    }

    /// Run a batch one call at a time. Later calls observe the effects of
    /// earlier ones, so this must never be parallelized.
    pub async fn execute_all(
        &self,
        key: &str,
        calls: Vec<FunctionCall>,
    ) -> Vec<FunctionCallRecord> {
        let mut records = Vec::with_capacity(calls.len());
        for call in calls {
            records.push(self.execute(key, call).await);
        }
        records
    }

    pub async fn execute(&self, key: &str, call: FunctionCall) -> FunctionCallRecord {
        tracing::info!(key, function = %call.name, "Executing function call");

        let result = match call.name.as_str() {
            GET_ISSUE => self.get_issue(key, &call).await,
            CREATE_BRANCH => self.create_branch(key, &call).await,
            CREATE_COMMIT => self.create_commit(key, &call).await,
            CREATE_PULL_REQUEST => self.create_pull_request(key, &call).await,
            _ => self.invoke(key, &call).await,
        };

        match &result {
            CallOutcome::Success(_) => {
                tracing::debug!(key, function = %call.name, "Function call succeeded");
            }
            CallOutcome::Rejected { error } => {
                tracing::warn!(key, function = %call.name, error = %error, "Function call rejected");
            }
            CallOutcome::Failed { error } => {
                tracing::error!(key, function = %call.name, error = %error, "Function call failed");
            }
        }

        call.with_result(result)
    }

    async fn invoke(&self, key: &str, call: &FunctionCall) -> CallOutcome {
        match self.registry.execute(&call.name, &call.arguments, key).await {
            Ok(value) => CallOutcome::Success(value),
            Err(FunctionError::Handler(e)) => CallOutcome::Failed {
                error: e.to_string(),
            },
            Err(e) => CallOutcome::Rejected {
                error: e.to_string(),
            },
        }
    }

    async fn get_issue(&self, key: &str, call: &FunctionCall) -> CallOutcome {
        let outcome = self.invoke(key, call).await;

        if let CallOutcome::Success(issue) = &outcome {
            let number = issue["number"]
                .as_u64()
                .or_else(|| u64_arg(GET_ISSUE, &call.arguments, "number").ok());
            if let Some(number) = number {
                self.tracker.record_issue_number(key, number);
            }
        }

        outcome
    }

    async fn create_branch(&self, key: &str, call: &FunctionCall) -> CallOutcome {
        let name = match call.arguments["name"].as_str().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            // Let the registry report the argument problem
            _ => return self.invoke(key, call).await,
        };
        if let Err(e) = validate_branch_name(name) {
            return CallOutcome::Rejected {
                error: e.to_string(),
            };
        }

        if self.tracker.has_branch(key, name) {
            return CallOutcome::Success(json!({
                "branch": name,
                "already_created": true,
                "message": format!("Branch '{name}' was already created in this workflow"),
            }));
        }

        match self.platform.branch_exists(name).await {
            Ok(true) => {
                self.tracker.record_branch_created(key, name);
                CallOutcome::Success(json!({
                    "branch": name,
                    "already_existed": true,
                    "message": format!("Branch '{name}' already exists; continuing with it"),
                }))
            }
            Ok(false) => {
                let outcome = self.invoke(key, &normalized(call, "name", name)).await;
                if outcome.is_success() {
                    self.tracker.record_branch_created(key, name);
                }
                outcome
            }
            Err(e) => CallOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn create_commit(&self, key: &str, call: &FunctionCall) -> CallOutcome {
        let Some(branch) = call.arguments["branch"].as_str().map(str::trim) else {
            return self.invoke(key, call).await;
        };

        if !self.tracker.has_branch(key, branch) {
            return CallOutcome::Rejected {
                error: format!(
                    "Branch '{branch}' does not exist; call createBranch first{}. Required order: {REQUIRED_ORDER}.",
                    self.issue_hint(key)
                ),
            };
        }

        let outcome = self.invoke(key, &normalized(call, "branch", branch)).await;
        if outcome.is_success() {
            self.tracker.record_commit_created(key, branch);
        }
        outcome
    }

    async fn create_pull_request(&self, key: &str, call: &FunctionCall) -> CallOutcome {
        let Some(head) = call.arguments["head"].as_str().map(str::trim) else {
            return self.invoke(key, call).await;
        };

        if !self.tracker.has_branch(key, head) {
            return CallOutcome::Rejected {
                error: format!(
                    "Cannot open a pull request from '{head}': the branch has not been created in this workflow{}. \
                     Call createBranch, then createCommit, then createPullRequest ({REQUIRED_ORDER}).",
                    self.issue_hint(key)
                ),
            };
        }

        let outcome = self.invoke(key, &normalized(call, "head", head)).await;
        if outcome.is_success() {
            self.tracker.record_pull_request_created(key, head);
        }
        outcome
    }

    fn issue_hint(&self, key: &str) -> String {
        self.tracker
            .get_state(key)
            .current_issue_number
            .map(|n| format!(" (current issue: #{n})"))
            .unwrap_or_default()
    }
}

/// Copy of `call` with `field` set to the trimmed name the state checks used,
/// so the adapter acts on the same branch the tracker records.
fn normalized(call: &FunctionCall, field: &str, value: &str) -> FunctionCall {
    let mut call = call.clone();
    call.arguments[field] = json!(value);
    call
}
