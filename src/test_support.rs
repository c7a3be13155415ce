//! In-memory stand-ins for GitHub, the language model and the chat transport.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agent::definition::AgentDefinition;
use crate::agent::{HistoryEntry, LanguageModel, LlmResponse};
use crate::chat::{ChatTransport, OutboundMessage};
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::GitHubOperations;
use crate::workflow::FunctionCall;

/// Records every adapter call by operation name (`create_branch`, `create_commit`, ...).
pub struct FakeGitHub {
    calls: Mutex<Vec<String>>,
    branches: Mutex<HashSet<String>>,
    /// Target branch of each commit and head of each pull request, in call order.
    targets: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            branches: Mutex::new(HashSet::from(["main".to_string()])),
            targets: Mutex::new(Vec::new()),
            failing: HashSet::new(),
        }
    }

    /// Pretend `name` already exists on the remote.
    pub fn with_branch(self, name: &str) -> Self {
        self.branches.lock().insert(name.to_string());
        self
    }

    /// Make operation `op` fail with a GitHub API error.
    pub fn failing(mut self, op: &str) -> Self {
        self.failing.insert(op.to_string());
        self
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }

    fn record(&self, op: &str) -> Result<()> {
        self.calls.lock().push(op.to_string());
        if self.failing.contains(op) {
            return Err(AppError::GitHubApi(format!("{op}: 502 Bad Gateway")));
        }
        Ok(())
    }
}

#[async_trait]
impl GitHubOperations for FakeGitHub {
    async fn get_repository(&self) -> Result<Repository> {
        self.record("get_repository")?;
        Ok(Repository {
            full_name: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
            description: None,
            url: Some("https://github.com/acme/widgets".to_string()),
        })
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        self.record("get_issue")?;
        Ok(Issue {
            number,
            title: format!("Issue {number}"),
            body: "Implement the feature".to_string(),
            state: "open".to_string(),
        })
    }

    async fn branch_exists(&self, name: &str) -> Result<bool> {
        self.record("branch_exists")?;
        Ok(self.branches.lock().contains(name))
    }

    async fn create_branch(&self, name: &str, _source: &str) -> Result<BranchRef> {
        self.record("create_branch")?;
        self.branches.lock().insert(name.to_string());
        Ok(BranchRef {
            ref_name: format!("refs/heads/{name}"),
            sha: "1111111".to_string(),
        })
    }

    async fn create_commit(&self, commit: &CreateCommit) -> Result<CommitInfo> {
        self.record("create_commit")?;
        self.targets.lock().push(commit.branch.clone());
        Ok(CommitInfo {
            sha: "2222222".to_string(),
        })
    }

    async fn create_pull_request(&self, pr: &CreatePullRequest) -> Result<PullRequest> {
        self.record("create_pull_request")?;
        self.targets.lock().push(pr.head.clone());
        Ok(PullRequest {
            number: 7,
            url: "https://github.com/acme/widgets/pull/7".to_string(),
        })
    }
}

/// What the fake model saw on one call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub agent_id: String,
    pub message: String,
    pub history: Vec<HistoryEntry>,
}

/// Replies with scripted responses in order; errors once the script runs out.
pub struct FakeLanguageModel {
    responses: Mutex<VecDeque<Result<LlmResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl FakeLanguageModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, text: &str, function_calls: Vec<FunctionCall>) -> Self {
        self.responses.lock().push_back(Ok(LlmResponse {
            text: text.to_string(),
            function_calls,
        }));
        self
    }

    pub fn fail(self, error: &str) -> Self {
        self.responses
            .lock()
            .push_back(Err(AppError::ClaudeApi(error.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn generate_response(
        &self,
        agent: &AgentDefinition,
        message: &str,
        history: &[HistoryEntry],
    ) -> Result<LlmResponse> {
        self.requests.lock().push(ModelRequest {
            agent_id: agent.id.clone(),
            message: message.to_string(),
            history: history.to_vec(),
        });

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::ClaudeApi("no scripted response".to_string())))
    }
}

/// Collects posted messages.
#[derive(Default)]
pub struct FakeChat {
    posted: Mutex<Vec<OutboundMessage>>,
    fail: bool,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            posted: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn posted(&self) -> Vec<OutboundMessage> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeChat {
    async fn post_message(&self, message: &OutboundMessage) -> Result<()> {
        self.posted.lock().push(message.clone());
        if self.fail {
            return Err(AppError::Slack("channel_not_found".to_string()));
        }
        Ok(())
    }
}
